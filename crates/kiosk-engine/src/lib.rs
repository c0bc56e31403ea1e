//! # kiosk-engine: Settlement and Refund Engines
//!
//! The ledger and inventory-consistency core of the Coop Kiosk.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Coop Kiosk Architecture                           │
//! │                                                                         │
//! │  Collaborators (HTTP handlers, kiosk UI, admin screens, printer)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              ★ kiosk-engine (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   KioskService ──┬─► SettlementEngine ──┬─► StockLedger        │   │
//! │  │   (facade)       │                      ├─► MemberLedger       │   │
//! │  │                  └─► RefundEngine ──────┘                      │   │
//! │  │                                                                 │   │
//! │  │   RowLocks: sorted, scoped per-entity locks around every       │   │
//! │  │   unit of work                                                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                  kiosk-db (SQLite) + kiosk-core (pure logic)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Atomicity**: a settlement or refund commits whole or not at all;
//!   every write goes through one sqlx transaction.
//! - **No negative stock**: validation happens after lock acquisition,
//!   inside the decrementing unit of work.
//! - **Deterministic lock order**: sorted key acquisition prevents
//!   lock-ordering deadlocks between carts sharing products.
//! - **Audited mutation**: every stock/balance change appends exactly one
//!   movement row with before/after snapshots.
//! - **Invertible sales**: a refund restores stock per item, credits the
//!   full amount to balance, and cancels the transaction exactly once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiosk_db::{Database, DbConfig};
//! use kiosk_engine::{ActingIdentity, KioskConfig, KioskService, SettleRequest};
//!
//! let db = Database::new(DbConfig::new("./kiosk.db")).await?;
//! let service = KioskService::new(db, KioskConfig::default());
//!
//! let receipt = service.settle(request, &acting).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod account;
pub mod config;
pub mod error;
pub mod identity;
pub mod locks;
pub mod pin;
pub mod refund;
pub mod service;
pub mod settlement;
pub mod stock;
pub mod txnum;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use account::MemberLedger;
pub use config::KioskConfig;
pub use error::{EngineError, EngineResult};
pub use identity::ActingIdentity;
pub use locks::{LockKey, RowLockGuard, RowLocks};
pub use refund::{RefundReceipt, RefundRequest, REFUND_MARKER};
pub use service::KioskService;
pub use settlement::{CartLine, MemberSummary, SettleRequest, SettlementReceipt};
pub use stock::StockLedger;
