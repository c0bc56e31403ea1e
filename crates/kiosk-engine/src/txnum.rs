//! # Transaction Number Generator
//!
//! Business identifiers for transactions: `TXN{YYYYMMDDHHMMSS}{NNNN}`.
//! Timestamp prefix makes them sortable; the 4-digit suffix disambiguates
//! transactions within the same second. The column's UNIQUE constraint
//! catches the (rare) collision, surfaced as an integrity error that
//! callers may retry.

use chrono::Utc;

/// Generates a new transaction number.
pub fn generate_transaction_number() -> String {
    let now = Utc::now();
    let timestamp = now.format("%Y%m%d%H%M%S");

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let suffix = nanos % 10_000;

    format!("TXN{}{:04}", timestamp, suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let number = generate_transaction_number();
        assert!(number.starts_with("TXN"));
        // TXN + 14-digit timestamp + 4-digit suffix
        assert_eq!(number.len(), 3 + 14 + 4);
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_sortable_by_time() {
        let a = generate_transaction_number();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let b = generate_transaction_number();
        assert!(b > a);
    }
}
