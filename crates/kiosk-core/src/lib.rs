//! # kiosk-core: Pure Business Logic for the Coop Kiosk
//!
//! This crate is the **heart** of the kiosk. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Coop Kiosk Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Collaborators (HTTP, kiosk UI, admin, printer)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kiosk-engine (settlement, refund)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kiosk-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │    vat    │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ vat_line  │  │   rules   │  │   │
//! │  │   │  Member   │  │  RateBps  │  │ sum_lines │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Member, Transaction, movements)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`vat`] - VAT-inclusive line decomposition and aggregates
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic - same input = same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are centavos (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;
pub mod validation;
pub mod vat;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use kiosk_core::Money` instead of
// `use kiosk_core::money::Money`

pub use error::ValidationError;
pub use money::{Money, RateBps};
pub use types::*;
pub use vat::{sum_lines, vat_line, LineAmounts, TransactionAmounts};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single cart line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., a barcode scanned into the
/// quantity field). Mirrors the kiosk's hard cap.
pub const MAX_ITEM_QUANTITY: i64 = 1000;

/// Minimum search query length; shorter queries return no results.
pub const MIN_SEARCH_QUERY_LEN: usize = 2;

/// Member PINs are exactly this many digits.
pub const PIN_LENGTH: usize = 4;

/// VAT rate applied when no configuration is supplied (12%).
pub const DEFAULT_VAT_RATE_BPS: u32 = 1200;

/// Patronage rate applied when the member has no member-type rate (5%).
pub const DEFAULT_PATRONAGE_RATE_BPS: u32 = 500;
