//! # Refund Engine
//!
//! Reverses a completed sale in one atomic unit of work:
//!
//! ```text
//! authorize caller ──► lock rows ──► open unit of work
//!       │
//!       ▼
//! guarded transition completed → cancelled   (the single-shot gate)
//!       │
//!       ▼
//! credit member balance ──► restock every surviving item
//!       │
//!       ▼  commit
//! refund receipt (text + structured payload)
//! ```
//!
//! Refunds always credit the member's **balance**, regardless of how the
//! sale was originally funded - a utang-paid sale comes back as spendable
//! balance, never as a utang reduction. The store treats refunds as money
//! returned, not debt renegotiated.
//!
//! The cancelled transaction keeps the `Refunded.` notes marker the store's
//! reports scan for, and additionally carries an `is_refund` flag set in
//! the same guarded update.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use kiosk_core::{Member, Money, Transaction, TransactionItem, TransactionStatus};
use kiosk_db::{Database, DbError};

use crate::account::MemberLedger;
use crate::config::KioskConfig;
use crate::error::{EngineError, EngineResult};
use crate::identity::ActingIdentity;
use crate::locks::{LockKey, RowLocks};
use crate::settlement::MemberSummary;
use crate::stock::StockLedger;

/// Notes marker identifying a cancelled transaction as a refund.
/// Reporting scans for this exact text; keep it stable.
pub const REFUND_MARKER: &str = "Refunded";

// =============================================================================
// Request / Receipt Types
// =============================================================================

/// A refund request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: String,
    /// Free-text reason, appended to the refund marker.
    pub reason: Option<String>,
}

/// Everything a collaborator needs to render the refund receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    /// The transaction in its post-refund state.
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
    pub member: Option<MemberSummary>,
    pub refund_amount_cents: i64,
    /// Plain-text receipt, ready for the printer collaborator.
    pub text: String,
}

// =============================================================================
// Engine
// =============================================================================

/// Reverses completed sales.
pub struct RefundEngine<'a> {
    db: &'a Database,
    locks: &'a RowLocks,
    config: &'a KioskConfig,
}

impl<'a> RefundEngine<'a> {
    pub fn new(db: &'a Database, locks: &'a RowLocks, config: &'a KioskConfig) -> Self {
        RefundEngine { db, locks, config }
    }

    /// Refunds a completed transaction. See the module docs for the flow.
    pub async fn refund(
        &self,
        request: RefundRequest,
        acting: &ActingIdentity,
    ) -> EngineResult<RefundReceipt> {
        let transactions = self.db.transactions();
        let members = self.db.members();

        // --- Load and gate ----------------------------------------------------
        let mut transaction = transactions
            .get_by_id(&request.transaction_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Transaction", request.transaction_id.clone()))?;

        if transaction.status != TransactionStatus::Completed {
            return Err(EngineError::StateConflict {
                transaction_number: transaction.transaction_number.clone(),
                status: transaction.status,
            });
        }

        // --- Authorize: staff, or the member who owns the sale ---------------
        if !acting.role.is_staff() {
            let owns = matches!(
                (&acting.member_id, &transaction.member_id),
                (Some(actor), Some(owner)) if actor == owner
            );
            if !owns {
                return Err(EngineError::Authorization(
                    "you can only refund your own transactions".to_string(),
                ));
            }
        }

        let items = transactions.get_items(&transaction.id).await?;

        // --- Lock every row we will mutate ------------------------------------
        let mut keys: Vec<LockKey> = items
            .iter()
            .filter_map(|item| item.product_id.clone())
            .map(LockKey::Product)
            .collect();
        if let Some(member_id) = &transaction.member_id {
            keys.push(LockKey::Member(member_id.clone()));
        }
        let _row_guard = self.locks.lock_all(keys).await;

        let stock = StockLedger::new(self.db);
        let ledger = MemberLedger::new(self.db);

        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        let notes = match reason {
            Some(r) => format!("{REFUND_MARKER}. {r}"),
            None => REFUND_MARKER.to_string(),
        };

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        // --- Single-shot gate: only one refund wins the transition ------------
        // The guarded update re-checks `status = 'completed'` inside the
        // unit of work, so a racing second refund sees zero affected rows
        // even though both passed the pre-read above.
        let won = transactions
            .cancel_completed(&mut tx, &transaction.id, &notes)
            .await?;
        if !won {
            return Err(EngineError::StateConflict {
                transaction_number: transaction.transaction_number.clone(),
                status: TransactionStatus::Cancelled,
            });
        }

        // --- Credit the full amount back to balance ---------------------------
        let mut member_summary = None;
        if let Some(member_id) = &transaction.member_id {
            let mut member: Member = members
                .get_for_update(&mut tx, member_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Member", member_id.clone()))?;
            let before = member.clone();

            if transaction.total_cents > 0 {
                let movement_note = match reason {
                    Some(r) => format!(
                        "Refund for transaction {} (Original: {}). {}",
                        transaction.transaction_number,
                        transaction.payment_method.display(),
                        r
                    ),
                    None => format!(
                        "Refund for transaction {} (Original: {})",
                        transaction.transaction_number,
                        transaction.payment_method.display()
                    ),
                };
                ledger
                    .credit(&mut tx, &mut member, transaction.total(), &movement_note)
                    .await?;
            }

            member_summary = Some(MemberSummary::from_states(&before, &member));
        }

        // --- Restore stock for every item whose product still exists ----------
        let restock_note = format!("Refund for transaction {}", transaction.transaction_number);
        for item in &items {
            let Some(product_id) = &item.product_id else {
                continue;
            };
            match stock
                .restock(&mut tx, product_id, item.quantity, &restock_note)
                .await
            {
                Ok(_) => {}
                // The product was deleted since the sale; the snapshot on
                // the item keeps the receipt intact, nothing to restock.
                Err(EngineError::NotFound { .. }) => {
                    warn!(product_id = %product_id, "Refund restock skipped: product gone");
                }
                Err(err) => return Err(err),
            }
        }

        // --- Commit ------------------------------------------------------------
        tx.commit().await.map_err(DbError::from)?;

        transaction.status = TransactionStatus::Cancelled;
        transaction.is_refund = true;
        transaction.notes = notes;
        transaction.updated_at = Utc::now();

        info!(
            transaction_number = %transaction.transaction_number,
            refund_cents = transaction.total_cents,
            "Refund processed"
        );

        let text = render_receipt_text(
            &transaction,
            &items,
            member_summary.as_ref(),
            reason,
            self.config,
        );

        Ok(RefundReceipt {
            refund_amount_cents: transaction.total_cents,
            transaction,
            items,
            member: member_summary,
            text,
        })
    }
}

// =============================================================================
// Receipt Rendering
// =============================================================================

/// Renders the plain-text refund receipt the printer collaborator consumes.
fn render_receipt_text(
    transaction: &Transaction,
    items: &[TransactionItem],
    member: Option<&MemberSummary>,
    reason: Option<&str>,
    config: &KioskConfig,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("COOPERATIVE STORE".to_string());
    lines.push("REFUND RECEIPT".to_string());
    lines.push(String::new());

    lines.push("Original Txn:".to_string());
    lines.push(transaction.transaction_number.clone());
    lines.push("Refund Date:".to_string());
    lines.push(
        transaction
            .updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    );
    lines.push(String::new());

    if let Some(member) = member {
        lines.push("Member:".to_string());
        lines.push(member.name.clone());
        lines.push(String::new());
    }

    lines.push("ITEMS REFUNDED:".to_string());
    for item in items {
        lines.push(format!("{} x{}", item.product_name, item.quantity));
        lines.push(item.total().to_string());
    }
    lines.push(String::new());

    lines.push("Vatable Sale:".to_string());
    lines.push(Money::from_cents(transaction.vatable_cents).to_string());
    lines.push(format!("VAT ({:.0}%):", config.vat_rate.percentage()));
    lines.push(Money::from_cents(transaction.vat_cents).to_string());
    lines.push("Subtotal:".to_string());
    lines.push(transaction.subtotal().to_string());
    lines.push("Total Refund:".to_string());
    lines.push(transaction.total().to_string());
    lines.push(String::new());

    lines.push("REFUND METHOD:".to_string());
    lines.push("Refunded to Member Balance".to_string());
    if let Some(member) = member {
        lines.push(format!(
            "Balance Before: {}",
            Money::from_cents(member.balance_before_cents)
        ));
        lines.push(format!(
            "Balance After: {}",
            Money::from_cents(member.balance_after_cents)
        ));
    }
    lines.push(String::new());

    if let Some(reason) = reason {
        lines.push("Reason:".to_string());
        lines.push(reason.to_string());
        lines.push(String::new());
    }

    lines.push("Thank you!".to_string());

    lines.join("\r\n")
}
