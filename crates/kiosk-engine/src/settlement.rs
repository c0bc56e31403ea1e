//! # Settlement Engine
//!
//! The sale state machine: `pending → completed`, all inside one atomic
//! unit of work. A failed settlement leaves no trace - no transaction row,
//! no items, no stock decrement, no ledger movement.
//!
//! ## Flow
//! ```text
//! validate cart ──► authenticate member ──► lock rows (sorted)
//!       │
//!       ▼  open unit of work
//! reserve stock ──► pending transaction + items ──► aggregates
//!       │
//!       ▼
//! patronage accrual ──► payment waterfall ──► completed
//!       │
//!       ▼  commit
//! receipt (transaction + items + member deltas + change)
//! ```
//!
//! ## The Payment Waterfall
//! - **cash**: optional tendered amount must cover the total; change is
//!   returned on the receipt
//! - **debit**: full total from balance when it suffices; otherwise the
//!   entire balance is drained and the remainder goes to utang, and the
//!   stored payment method becomes `credit` so the record describes the
//!   actual funding source
//! - **credit**: the whole total goes to utang, unconditionally

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kiosk_core::validation::{validate_pin_format, validate_quantity};
use kiosk_core::{
    sum_lines, vat_line, LineAmounts, Member, Money, PaymentMethod, Transaction, TransactionItem,
    TransactionStatus, ValidationError,
};
use kiosk_db::repository::transaction::{generate_item_id, generate_transaction_id};
use kiosk_db::{Database, DbError};

use crate::account::MemberLedger;
use crate::config::KioskConfig;
use crate::error::{EngineError, EngineResult};
use crate::identity::ActingIdentity;
use crate::locks::{LockKey, RowLocks};
use crate::pin::verify_pin;
use crate::stock::StockLedger;
use crate::txnum::generate_transaction_number;

// =============================================================================
// Request / Receipt Types
// =============================================================================

/// One cart line as submitted by the kiosk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A settlement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest {
    /// Paying member; optional for cash sales.
    pub member_id: Option<String>,
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    /// Member PIN; required for debit/credit unless the operator is staff.
    pub pin: Option<String>,
    /// Cash tendered; when omitted, exact payment is assumed.
    pub cash_tendered_cents: Option<i64>,
}

/// Member balances around one operation, for receipt transparency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_id: String,
    pub name: String,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub utang_before_cents: i64,
    pub utang_after_cents: i64,
}

impl MemberSummary {
    pub(crate) fn from_states(before: &Member, after: &Member) -> Self {
        MemberSummary {
            member_id: after.id.clone(),
            name: after.full_name(),
            balance_before_cents: before.balance_cents,
            balance_after_cents: after.balance_cents,
            utang_before_cents: before.utang_cents,
            utang_after_cents: after.utang_cents,
        }
    }
}

/// Everything the receipt renderer needs after a successful settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
    pub member: Option<MemberSummary>,
    /// Change due back to the customer (cash sales only).
    pub change_cents: i64,
}

// =============================================================================
// Engine
// =============================================================================

/// Orchestrates one sale.
pub struct SettlementEngine<'a> {
    db: &'a Database,
    locks: &'a RowLocks,
    config: &'a KioskConfig,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(db: &'a Database, locks: &'a RowLocks, config: &'a KioskConfig) -> Self {
        SettlementEngine { db, locks, config }
    }

    /// Settles a cart. See the module docs for the full flow.
    pub async fn settle(
        &self,
        request: SettleRequest,
        acting: &ActingIdentity,
    ) -> EngineResult<SettlementReceipt> {
        // --- 1. Validate the cart before touching anything -------------------
        if request.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }
        for line in &request.items {
            validate_quantity(line.quantity)?;
        }

        let method = request.payment_method;

        // --- 2. Resolve and authenticate the member --------------------------
        let member = match &request.member_id {
            Some(id) => {
                let member = self
                    .db
                    .members()
                    .get_by_id(id)
                    .await?
                    .filter(|m| m.is_active)
                    .ok_or_else(|| EngineError::not_found("Member", id.clone()))?;
                Some(member)
            }
            None => None,
        };

        if method.requires_member() {
            let Some(member) = member.as_ref() else {
                return Err(EngineError::Authentication(
                    "member required for debit/credit payment".to_string(),
                ));
            };

            // The paying member must be the one authenticated by RFID scan
            // in this session.
            if acting.scanned_member_id.as_deref() != Some(member.id.as_str()) {
                return Err(EngineError::Authentication(
                    "member authentication required; scan the RFID card again".to_string(),
                ));
            }

            // Staff operators bypass the PIN. This is a deliberate trust
            // boundary: cashiers can charge any scanned member account.
            if !acting.role.is_staff() {
                let pin = request.pin.as_deref().ok_or_else(|| {
                    EngineError::Authentication(
                        "PIN is required for member payments".to_string(),
                    )
                })?;
                validate_pin_format(pin)?;
                let stored = member.pin_hash.as_deref().ok_or_else(|| {
                    EngineError::Authentication("no PIN set for this member".to_string())
                })?;
                if !verify_pin(pin, stored) {
                    return Err(EngineError::Authentication("invalid PIN".to_string()));
                }
            }
        }

        // --- 3. Lock every row we will mutate, in deterministic order --------
        let mut keys: Vec<LockKey> = request
            .items
            .iter()
            .map(|line| LockKey::Product(line.product_id.clone()))
            .collect();
        if let Some(m) = &member {
            keys.push(LockKey::Member(m.id.clone()));
        }
        let _row_guard = self.locks.lock_all(keys).await;

        let transaction_number = generate_transaction_number();
        let stock = StockLedger::new(self.db);
        let ledger = MemberLedger::new(self.db);
        let transactions = self.db.transactions();
        let members = self.db.members();

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        // --- 4. Reserve and decrement stock ----------------------------------
        let pairs: Vec<(String, i64)> = request
            .items
            .iter()
            .map(|line| (line.product_id.clone(), line.quantity))
            .collect();
        let stock_note = format!("Sale via kiosk transaction {transaction_number}");
        let snapshots = stock.reserve_and_decrement(&mut tx, &pairs, &stock_note).await?;
        let by_product: HashMap<&str, &kiosk_core::ProductSnapshot> = snapshots
            .iter()
            .map(|s| (s.product_id.as_str(), s))
            .collect();

        // --- 5. Pending transaction + items at sale-time prices --------------
        let now = Utc::now();
        let mut transaction = Transaction {
            id: generate_transaction_id(),
            transaction_number: transaction_number.clone(),
            member_id: member.as_ref().map(|m| m.id.clone()),
            subtotal_cents: 0,
            vatable_cents: 0,
            vat_cents: 0,
            total_cents: 0,
            payment_method: method,
            amount_paid_cents: 0,
            amount_from_balance_cents: 0,
            amount_to_utang_cents: 0,
            patronage_cents: 0,
            patronage_rate_bps: self.config.default_patronage_rate.bps(),
            status: TransactionStatus::Pending,
            is_refund: false,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };
        transactions.insert(&mut tx, &transaction).await?;

        let mut line_amounts: Vec<LineAmounts> = Vec::with_capacity(request.items.len());
        let mut items: Vec<TransactionItem> = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let Some(snapshot) = by_product.get(line.product_id.as_str()) else {
                tracing::error!(product_id = %line.product_id, "Reserved cart line lost its snapshot");
                return Err(EngineError::Internal);
            };
            let amounts = vat_line(
                Money::from_cents(snapshot.unit_price_cents),
                line.quantity,
                self.config.vat_rate,
            );
            let item = TransactionItem {
                id: generate_item_id(),
                transaction_id: transaction.id.clone(),
                product_id: Some(snapshot.product_id.clone()),
                product_name: snapshot.name.clone(),
                product_barcode: snapshot.barcode.clone(),
                unit_price_cents: snapshot.unit_price_cents,
                quantity: line.quantity,
                total_cents: amounts.total_price.cents(),
                vat_cents: amounts.vat_amount.cents(),
                vatable_cents: amounts.vatable_sale.cents(),
                created_at: now,
            };
            transactions.insert_item(&mut tx, &item).await?;
            line_amounts.push(amounts);
            items.push(item);
        }

        // --- 6. Aggregates: sums of already-rounded per-item values ----------
        let totals = sum_lines(&line_amounts);
        transaction.subtotal_cents = totals.subtotal.cents();
        transaction.vatable_cents = totals.vatable_sale.cents();
        transaction.vat_cents = totals.vat_amount.cents();
        transaction.total_cents = totals.total_amount.cents();
        let total = totals.total_amount;

        // Re-read the member under the lock; the pre-lock read only served
        // authentication.
        let mut member_locked = match &member {
            Some(m) => Some(
                members
                    .get_for_update(&mut tx, &m.id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Member", m.id.clone()))?,
            ),
            None => None,
        };
        let member_before = member_locked.clone();

        // --- 7. Patronage -----------------------------------------------------
        let patronage_rate = member_locked
            .as_ref()
            .map(|m| m.patronage_rate(self.config.default_patronage_rate))
            .unwrap_or(self.config.default_patronage_rate);
        let patronage = totals.subtotal.portion(patronage_rate);
        transaction.patronage_rate_bps = patronage_rate.bps();
        transaction.patronage_cents = patronage.cents();

        if let Some(m) = member_locked.as_mut() {
            if patronage.is_positive() {
                ledger.accrue_patronage(&mut tx, m, patronage).await?;
            }
        }

        // --- 8. Payment waterfall ---------------------------------------------
        let mut change_cents = 0i64;
        match method {
            PaymentMethod::Cash => {
                match request.cash_tendered_cents {
                    Some(tendered) => {
                        if tendered < total.cents() {
                            return Err(EngineError::InsufficientCash {
                                total_cents: total.cents(),
                                tendered_cents: tendered,
                            });
                        }
                        transaction.amount_paid_cents = tendered;
                        change_cents = tendered - total.cents();
                    }
                    None => {
                        // Exact payment assumed.
                        transaction.amount_paid_cents = total.cents();
                    }
                }
            }
            PaymentMethod::Debit => {
                let Some(m) = member_locked.as_mut() else {
                    return Err(EngineError::Authentication(
                        "member required for debit/credit payment".to_string(),
                    ));
                };
                let payment_note = format!("Payment for transaction {transaction_number}");
                if m.balance_cents >= total.cents() {
                    if total.is_positive() {
                        ledger.debit(&mut tx, m, total, &payment_note).await?;
                    }
                    transaction.amount_from_balance_cents = total.cents();
                } else {
                    // Split settlement: drain the balance, spill the rest
                    // to utang, and record the sale as credit-funded.
                    let from_balance = m.balance_cents;
                    if from_balance > 0 {
                        ledger
                            .debit(&mut tx, m, Money::from_cents(from_balance), &payment_note)
                            .await?;
                    }
                    transaction.amount_from_balance_cents = from_balance;

                    let to_utang = total.cents() - from_balance;
                    ledger
                        .add_utang(
                            &mut tx,
                            m,
                            Money::from_cents(to_utang),
                            &format!("Utang for transaction {transaction_number}"),
                        )
                        .await?;
                    transaction.amount_to_utang_cents = to_utang;
                    transaction.payment_method = PaymentMethod::Credit;

                    debug!(
                        transaction_number = %transaction_number,
                        from_balance = from_balance,
                        to_utang = to_utang,
                        "Debit settlement split to utang"
                    );
                }
            }
            PaymentMethod::Credit => {
                let Some(m) = member_locked.as_mut() else {
                    return Err(EngineError::Authentication(
                        "member required for debit/credit payment".to_string(),
                    ));
                };
                if total.is_positive() {
                    ledger
                        .add_utang(
                            &mut tx,
                            m,
                            total,
                            &format!("Utang for transaction {transaction_number}"),
                        )
                        .await?;
                }
                transaction.amount_to_utang_cents = total.cents();
            }
        }

        // --- 9. Complete -------------------------------------------------------
        transaction.status = TransactionStatus::Completed;
        transaction.updated_at = Utc::now();
        transactions.update_settlement(&mut tx, &transaction).await?;

        if let Some(m) = &member_locked {
            members
                .touch_last_transaction(&mut tx, &m.id, transaction.updated_at)
                .await?;
        }

        // --- 10. Commit --------------------------------------------------------
        tx.commit().await.map_err(DbError::from)?;

        info!(
            transaction_number = %transaction.transaction_number,
            total_cents = transaction.total_cents,
            method = ?transaction.payment_method,
            items = items.len(),
            "Sale settled"
        );

        let member_summary = match (&member_before, &member_locked) {
            (Some(before), Some(after)) => Some(MemberSummary::from_states(before, after)),
            _ => None,
        };

        Ok(SettlementReceipt {
            transaction,
            items,
            member: member_summary,
            change_cents,
        })
    }
}
