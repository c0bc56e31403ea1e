//! # PIN Hashing
//!
//! Member PINs gate balance/utang payments. They are stored as salted
//! argon2 hashes (PHC strings) and never in plaintext.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};

use kiosk_core::validation::validate_pin_format;

use crate::error::{EngineError, EngineResult};

/// Hashes a 4-digit PIN with a fresh random salt.
///
/// ## Errors
/// - `Validation` when the PIN is not exactly 4 digits
pub fn hash_pin(pin: &str) -> EngineResult<String> {
    validate_pin_format(pin)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = %e, "PIN hashing failed");
            EngineError::Internal
        })?;

    Ok(hash.to_string())
}

/// Verifies a candidate PIN against a stored hash.
///
/// Returns false for malformed hashes rather than erroring: a corrupt hash
/// must fail closed.
pub fn verify_pin(pin: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
