//! # VAT Calculator
//!
//! Pure functions decomposing VAT-inclusive line prices and aggregating
//! transaction totals.
//!
//! ## The Decomposition Law
//! ```text
//! total_price  = unit_price × quantity
//! vat_amount   = round_half_up(total_price × rate)
//! vatable_sale = total_price - vat_amount
//! ```
//! `vatable_sale` is derived by subtraction, NOT by rounding
//! `total_price × (1 - rate)`, so the two parts always sum back to
//! `total_price` with zero residue.
//!
//! Transaction aggregates are sums of the already-rounded per-line values,
//! never a re-derivation from rounded subtotals. This makes
//! `Σ vat + Σ vatable == Σ total == transaction.total_amount` hold exactly
//! for every transaction regardless of item count.

use serde::{Deserialize, Serialize};

use crate::money::{Money, RateBps};

/// The VAT decomposition of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    /// unit_price × quantity.
    pub total_price: Money,
    /// VAT portion, rounded half-up to the cent.
    pub vat_amount: Money,
    /// total_price - vat_amount (exact by construction).
    pub vatable_sale: Money,
}

/// Aggregates over a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionAmounts {
    pub subtotal: Money,
    pub vatable_sale: Money,
    pub vat_amount: Money,
    pub total_amount: Money,
}

/// Decomposes one cart line into its VAT parts.
///
/// ## Example
/// ```rust
/// use kiosk_core::money::{Money, RateBps};
/// use kiosk_core::vat::vat_line;
///
/// let line = vat_line(Money::from_cents(5500), 2, RateBps::from_bps(1200));
/// assert_eq!(line.total_price.cents(), 11000);  // ₱110.00
/// assert_eq!(line.vat_amount.cents(), 1320);    // ₱13.20
/// assert_eq!(line.vatable_sale.cents(), 9680);  // ₱96.80
/// ```
pub fn vat_line(unit_price: Money, quantity: i64, rate: RateBps) -> LineAmounts {
    let total_price = unit_price * quantity;
    let vat_amount = total_price.portion(rate);
    LineAmounts {
        total_price,
        vat_amount,
        vatable_sale: total_price - vat_amount,
    }
}

/// Sums per-line amounts into transaction aggregates.
///
/// `total_amount` is vat + vatable, which equals the subtotal exactly
/// because every line satisfies the decomposition law.
pub fn sum_lines(lines: &[LineAmounts]) -> TransactionAmounts {
    let subtotal: Money = lines.iter().map(|l| l.total_price).sum();
    let vat_amount: Money = lines.iter().map(|l| l.vat_amount).sum();
    let vatable_sale: Money = lines.iter().map(|l| l.vatable_sale).sum();

    TransactionAmounts {
        subtotal,
        vatable_sale,
        vat_amount,
        total_amount: vat_amount + vatable_sale,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
