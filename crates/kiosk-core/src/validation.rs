//! # Validation Module
//!
//! Input validation for everything the kiosk accepts from the outside:
//! cart quantities, barcodes, RFID card numbers, PINs, money amounts and
//! search queries. Validation always runs before any mutation so a rejected
//! request is never partially applied.

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MIN_SEARCH_QUERY_LEN, PIN_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (1000)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a ledger amount in centavos.
///
/// ## Rules
/// - Must be strictly positive. Zero/negative amounts are a caller error:
///   every ledger operation moves a real amount of money.
pub fn validate_amount_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product barcode.
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if barcode.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates an RFID card number.
pub fn validate_rfid(rfid: &str) -> ValidationResult<()> {
    let rfid = rfid.trim();

    if rfid.is_empty() {
        return Err(ValidationError::Required {
            field: "rfid".to_string(),
        });
    }

    if rfid.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "rfid".to_string(),
            max: 50,
        });
    }

    Ok(())
}

/// Validates a member PIN.
///
/// ## Rules
/// - Exactly 4 digits (hash verification is a separate step)
pub fn validate_pin_format(pin: &str) -> ValidationResult<()> {
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "pin".to_string(),
            reason: format!("must be a {}-digit string", PIN_LENGTH),
        });
    }

    Ok(())
}

/// Validates a product search query.
///
/// ## Rules
/// - Minimum MIN_SEARCH_QUERY_LEN (2) characters after trimming; shorter
///   queries produce no results rather than an error
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query, or None when the query is too short to search.
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    if query.len() < MIN_SEARCH_QUERY_LEN {
        return Ok(None);
    }

    Ok(Some(query.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(500).is_ok());
        assert!(validate_quantity(1000).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1001).is_err());
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents(1).is_ok());
        assert!(validate_amount_cents(100_000).is_ok());
        assert!(validate_amount_cents(0).is_err());
        assert!(validate_amount_cents(-500).is_err());
    }

    #[test]
    fn test_validate_barcode() {
        assert!(validate_barcode("4800016641503").is_ok());
        assert!(validate_barcode("").is_err());
        assert!(validate_barcode("   ").is_err());
        assert!(validate_barcode(&"9".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_pin_format() {
        assert!(validate_pin_format("1234").is_ok());
        assert!(validate_pin_format("0000").is_ok());

        assert!(validate_pin_format("123").is_err());
        assert!(validate_pin_format("12345").is_err());
        assert!(validate_pin_format("12a4").is_err());
        assert!(validate_pin_format("").is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("ab").unwrap(), Some("ab".to_string()));
        assert_eq!(
            validate_search_query("  rice  ").unwrap(),
            Some("rice".to_string())
        );

        // Too short: no results, not an error
        assert_eq!(validate_search_query("a").unwrap(), None);
        assert_eq!(validate_search_query("").unwrap(), None);

        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }
}
