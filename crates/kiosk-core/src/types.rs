//! # Domain Types
//!
//! Core domain types used throughout the Coop Kiosk.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Member      │   │  Transaction    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  barcode        │   │  rfid_card      │   │  txn_number     │       │
//! │  │  stock_quantity │   │  balance/utang  │   │  status         │       │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │           │                     │                     │                 │
//! │   StockMovement         BalanceMovement       TransactionItem          │
//! │   (append-only)         (append-only)         (sale-time snapshot)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (barcode, rfid_card_number, transaction_number) -
//!   human-readable, scanned or printed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, RateBps};

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale is funded.
///
/// "debit" means paid from the member's stored balance; "credit" means added
/// to the member's utang. A debit sale whose balance falls short is settled
/// partly from balance, partly to utang, and stored as `Credit` so the
/// record describes the actual funding source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Debit,
    Credit,
}

impl PaymentMethod {
    /// Human-readable label used on receipts and movement notes.
    pub fn display(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Debit => "Debit (Member Account)",
            PaymentMethod::Credit => "Credit (Utang)",
        }
    }

    /// Whether this method draws on a member account.
    pub fn requires_member(&self) -> bool {
        matches!(self, PaymentMethod::Debit | PaymentMethod::Credit)
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// The status of a sale transaction.
///
/// `Pending` is transient: it exists only inside the settlement unit of work
/// and must never be observable after the engine returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

// =============================================================================
// Member Role
// =============================================================================

/// Role attached to a member account.
///
/// Cashier and admin roles act on behalf of the store: they may process any
/// refund and bypass PIN checks during member-funded payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Cashier,
    Member,
}

impl MemberRole {
    /// Whether this role carries store-side privileges.
    pub fn is_staff(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Cashier)
    }
}

// =============================================================================
// Movement Kinds
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    /// Restock (refund, delivery).
    In,
    /// Sale.
    Out,
    /// Manual admin correction.
    Adjustment,
}

/// Kind of a member balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BalanceMovementKind {
    /// Balance increased (refill, refund).
    Deposit,
    /// Balance decreased (debit payment).
    Deduction,
    /// Utang decreased (member paid off credit).
    UtangPayment,
    /// Utang increased (credit payment or debit spillover).
    UtangAdded,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Scanned business identifier, unique across the store.
    pub barcode: String,

    /// Display name shown on the kiosk and on receipts.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Selling price in centavos (VAT-inclusive).
    pub price_cents: i64,

    /// Acquisition cost in centavos.
    pub cost_cents: i64,

    /// Current stock level. Never negative.
    pub stock_quantity: i64,

    /// Stock level at or below which the product counts as low-stock.
    pub low_stock_threshold: i64,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_quantity <= 0
    }
}

/// Post-mutation view of a product returned by the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub name: String,
    pub barcode: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub low_stock: bool,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Append-only audit record of one stock mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub kind: StockMovementKind,
    /// Signed delta applied to stock_quantity (negative for sales).
    pub delta: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Member
// =============================================================================

/// A cooperative member with three money pools: spendable balance,
/// outstanding utang, and cumulative patronage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Member {
    pub id: String,

    /// RFID card identity, unique across members.
    pub rfid_card_number: String,

    /// argon2 PHC string; None until a PIN is assigned.
    /// Never serialized into receipt payloads.
    #[serde(skip_serializing, default)]
    pub pin_hash: Option<String>,

    pub first_name: String,
    pub last_name: String,

    pub role: MemberRole,

    /// Member-type patronage rate; None falls back to the configured default.
    pub patronage_rate_bps: Option<u32>,

    /// Spendable stored value in centavos.
    pub balance_cents: i64,

    /// Outstanding store credit owed, in centavos. Never negative.
    pub utang_cents: i64,

    /// Cumulative rebate accrual in centavos. Monotonically non-decreasing.
    pub total_patronage_cents: i64,

    pub is_active: bool,

    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    #[inline]
    pub fn utang(&self) -> Money {
        Money::from_cents(self.utang_cents)
    }

    /// The patronage rate to apply, given a configured default.
    pub fn patronage_rate(&self, default_rate: RateBps) -> RateBps {
        self.patronage_rate_bps
            .map(RateBps::from_bps)
            .unwrap_or(default_rate)
    }
}

// =============================================================================
// Balance Movement
// =============================================================================

/// Append-only audit record of one balance/utang mutation, with before/after
/// snapshots of both pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BalanceMovement {
    pub id: String,
    pub member_id: String,
    pub kind: BalanceMovementKind,
    pub amount_cents: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub utang_before_cents: i64,
    pub utang_after_cents: i64,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Transaction
// =============================================================================

/// A sale record. Created `pending` inside the settlement unit of work,
/// completed within the same unit of work, optionally cancelled exactly once
/// by a refund. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: String,

    /// Time-sortable business identifier: TXN{YYYYMMDDHHMMSS}{4 digits}.
    pub transaction_number: String,

    /// Owning member, if any. Cash sales may be anonymous.
    pub member_id: Option<String>,

    pub subtotal_cents: i64,
    pub vatable_cents: i64,
    pub vat_cents: i64,
    pub total_cents: i64,

    pub payment_method: PaymentMethod,

    /// Cash tendered (cash sales only).
    pub amount_paid_cents: i64,
    /// Portion funded from the member's balance.
    pub amount_from_balance_cents: i64,
    /// Portion pushed to the member's utang.
    pub amount_to_utang_cents: i64,

    pub patronage_cents: i64,
    /// Rate snapshot used for this sale.
    pub patronage_rate_bps: u32,

    pub status: TransactionStatus,

    /// Set together with the cancelled status when the cancellation is a
    /// refund.
    pub is_refund: bool,

    pub notes: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Transaction Item
// =============================================================================

/// A line item in a sale.
///
/// Uses the snapshot pattern: product name, barcode and unit price are
/// frozen at sale time so historical receipts survive product renames,
/// repricing and deletion. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,

    /// Live product reference; nulled if the product is later deleted.
    pub product_id: Option<String>,

    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Barcode at time of sale (frozen).
    pub product_barcode: String,
    /// Unit price in centavos at time of sale (frozen).
    pub unit_price_cents: i64,

    pub quantity: i64,

    pub total_cents: i64,
    pub vat_cents: i64,
    pub vatable_cents: i64,

    pub created_at: DateTime<Utc>,
}

impl TransactionItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
