//! # kiosk-db: Database Layer for the Coop Kiosk
//!
//! This crate provides database access for the kiosk. It uses SQLite for
//! local storage with sqlx for async operations.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, member, transaction)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiosk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/kiosk.db")).await?;
//! let product = db.products().find_by_barcode("8888888888881").await?;
//! ```
//!
//! The settlement and refund engines in kiosk-engine begin their atomic
//! units of work from [`Database::pool`] and drive the repositories'
//! `&mut SqliteConnection` primitives inside them.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::member::MemberRepository;
pub use repository::product::ProductRepository;
pub use repository::transaction::TransactionRepository;
