//! # Transaction Repository
//!
//! Database operations for sale transactions and their line items.
//!
//! ## Transaction Lifecycle
//! ```text
//! 1. INSERT (pending)        inside the settlement unit of work
//! 2. update_settlement       aggregates + funding + completed status
//! 3. (optional) cancel_completed
//!                            guarded single transition to cancelled,
//!                            inside the refund unit of work
//! ```
//! Transactions are never deleted; items are immutable after insert.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kiosk_core::{Transaction, TransactionItem};

/// Column list shared by every transaction SELECT.
const TRANSACTION_COLUMNS: &str = "id, transaction_number, member_id, subtotal_cents, vatable_cents, vat_cents, \
     total_cents, payment_method, amount_paid_cents, amount_from_balance_cents, \
     amount_to_utang_cents, patronage_cents, patronage_rate_bps, status, is_refund, \
     notes, created_at, updated_at";

/// Repository for transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Gets a transaction by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?");
        let transaction = sqlx::query_as::<_, Transaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(transaction)
    }

    /// Gets a transaction by its business number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Transaction>> {
        let sql =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_number = ?");
        let transaction = sqlx::query_as::<_, Transaction>(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(transaction)
    }

    /// Gets all items for a transaction, in insertion order.
    pub async fn get_items(&self, transaction_id: &str) -> DbResult<Vec<TransactionItem>> {
        let items = sqlx::query_as::<_, TransactionItem>(
            r#"
            SELECT id, transaction_id, product_id, product_name, product_barcode,
                   unit_price_cents, quantity, total_cents, vat_cents, vatable_cents,
                   created_at
            FROM transaction_items
            WHERE transaction_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Counts transactions (for diagnostics and atomicity tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Unit-of-work primitives (used by the settlement and refund engines)
    // =========================================================================

    /// Inserts a transaction row inside the caller's unit of work.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - transaction number collision
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        transaction: &Transaction,
    ) -> DbResult<()> {
        debug!(
            id = %transaction.id,
            number = %transaction.transaction_number,
            "Inserting transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, transaction_number, member_id,
                subtotal_cents, vatable_cents, vat_cents, total_cents,
                payment_method, amount_paid_cents, amount_from_balance_cents,
                amount_to_utang_cents, patronage_cents, patronage_rate_bps,
                status, is_refund, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.transaction_number)
        .bind(&transaction.member_id)
        .bind(transaction.subtotal_cents)
        .bind(transaction.vatable_cents)
        .bind(transaction.vat_cents)
        .bind(transaction.total_cents)
        .bind(transaction.payment_method)
        .bind(transaction.amount_paid_cents)
        .bind(transaction.amount_from_balance_cents)
        .bind(transaction.amount_to_utang_cents)
        .bind(transaction.patronage_cents)
        .bind(transaction.patronage_rate_bps)
        .bind(transaction.status)
        .bind(transaction.is_refund)
        .bind(&transaction.notes)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one line item inside the caller's unit of work.
    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        item: &TransactionItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                id, transaction_id, product_id,
                product_name, product_barcode, unit_price_cents,
                quantity, total_cents, vat_cents, vatable_cents, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.transaction_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(&item.product_barcode)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.total_cents)
        .bind(item.vat_cents)
        .bind(item.vatable_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes the settled state of a transaction: aggregates, patronage
    /// snapshot, funding breakdown, final payment method and status.
    ///
    /// Called exactly once per settlement, on the same row the engine
    /// inserted as pending earlier in the unit of work.
    pub async fn update_settlement(
        &self,
        conn: &mut SqliteConnection,
        transaction: &Transaction,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE transactions SET
                subtotal_cents = ?,
                vatable_cents = ?,
                vat_cents = ?,
                total_cents = ?,
                payment_method = ?,
                amount_paid_cents = ?,
                amount_from_balance_cents = ?,
                amount_to_utang_cents = ?,
                patronage_cents = ?,
                patronage_rate_bps = ?,
                status = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(transaction.subtotal_cents)
        .bind(transaction.vatable_cents)
        .bind(transaction.vat_cents)
        .bind(transaction.total_cents)
        .bind(transaction.payment_method)
        .bind(transaction.amount_paid_cents)
        .bind(transaction.amount_from_balance_cents)
        .bind(transaction.amount_to_utang_cents)
        .bind(transaction.patronage_cents)
        .bind(transaction.patronage_rate_bps)
        .bind(transaction.status)
        .bind(transaction.updated_at)
        .bind(&transaction.id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Transitions a **completed** transaction to cancelled, marking it as a
    /// refund and overwriting its notes with the refund marker.
    ///
    /// The `status = 'completed'` guard makes the transition single-shot:
    /// a concurrent second refund sees zero affected rows.
    ///
    /// ## Returns
    /// * `Ok(true)` - this call won the transition
    /// * `Ok(false)` - transaction was not in completed status
    pub async fn cancel_completed(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        notes: &str,
    ) -> DbResult<bool> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                status = 'cancelled',
                is_refund = 1,
                notes = ?,
                updated_at = ?
            WHERE id = ? AND status = 'completed'
            "#,
        )
        .bind(notes)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Generates a new transaction row ID.
pub fn generate_transaction_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new transaction item ID.
pub fn generate_item_id() -> String {
    Uuid::new_v4().to_string()
}
