//! # Engine Error Types
//!
//! The error taxonomy collaborators see. Every settlement/refund/service
//! operation returns `Result<_, EngineError>`; the HTTP layer maps these to
//! user-facing messages and status codes.
//!
//! ## Propagation Policy
//! Any error raised inside an atomic unit of work aborts that unit of work
//! in full - the sqlx transaction rolls back on drop, so no partial commit
//! can survive. Unexpected failures are logged (`tracing::error!`) where
//! they are mapped and surfaced as [`EngineError::Internal`] without
//! leaking detail to untrusted callers.

use thiserror::Error;

use kiosk_core::{TransactionStatus, ValidationError};
use kiosk_db::DbError;

/// Errors surfaced by the settlement core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input - caught before any mutation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced product/member/transaction does not exist or is inactive.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Requested quantity exceeds current stock.
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    /// Debit exceeds balance, where the operation requires sufficiency.
    /// The debit-with-utang-spillover path never raises this; it degrades
    /// into a split settlement instead.
    #[error("Insufficient funds: required {required_cents} centavos, available {available_cents}")]
    InsufficientFunds {
        required_cents: i64,
        available_cents: i64,
    },

    /// Utang reduction exceeds the outstanding utang.
    #[error("Insufficient utang: required {required_cents} centavos, outstanding {outstanding_cents}")]
    InsufficientUtang {
        required_cents: i64,
        outstanding_cents: i64,
    },

    /// Cash tendered does not cover the transaction total.
    #[error("Insufficient cash: total {total_cents} centavos, tendered {tendered_cents}")]
    InsufficientCash {
        total_cents: i64,
        tendered_cents: i64,
    },

    /// PIN missing/incorrect, or session/identity mismatch for a
    /// member-funded payment.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation attempted by a non-owning, non-privileged identity.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Refund attempted on a transaction not in completed status.
    #[error("Transaction {transaction_number} is {status:?}, not eligible for refund")]
    StateConflict {
        transaction_number: String,
        status: TransactionStatus,
    },

    /// Unique-constraint violation (e.g. transaction-number collision).
    /// Rare; callers may retry.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Unexpected failure, recorded before being returned.
    #[error("Internal error")]
    Internal,
}

impl EngineError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::UniqueViolation { field } => {
                EngineError::Integrity(format!("duplicate {field}"))
            }
            other => {
                // Storage-level failures carry no user-actionable detail;
                // record them here and return an opaque error.
                tracing::error!(error = %other, "Unexpected database failure");
                EngineError::Internal
            }
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
