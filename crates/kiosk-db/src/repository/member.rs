//! # Member Repository
//!
//! Database operations for members and the balance-movement audit trail.
//!
//! The three money pools (balance, utang, patronage) are only ever written
//! through `update_money`, which the account ledger calls inside an open
//! unit of work after re-reading the row.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kiosk_core::{BalanceMovement, Member};

/// Column list shared by every member SELECT.
const MEMBER_COLUMNS: &str = "id, rfid_card_number, pin_hash, first_name, last_name, role, \
     patronage_rate_bps, balance_cents, utang_cents, total_patronage_cents, \
     is_active, last_transaction_at, created_at, updated_at";

/// Repository for member database operations.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    /// Creates a new MemberRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MemberRepository { pool }
    }

    /// Gets a member by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Member>> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?");
        let member = sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(member)
    }

    /// Gets an active member by RFID card number (the kiosk scan path).
    pub async fn find_by_rfid(&self, rfid: &str) -> DbResult<Option<Member>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE rfid_card_number = ? AND is_active = 1"
        );
        let member = sqlx::query_as::<_, Member>(&sql)
            .bind(rfid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(member)
    }

    /// Inserts a new member.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - RFID card already registered
    pub async fn insert(&self, member: &Member) -> DbResult<()> {
        debug!(rfid = %member.rfid_card_number, "Inserting member");

        sqlx::query(
            r#"
            INSERT INTO members (
                id, rfid_card_number, pin_hash, first_name, last_name, role,
                patronage_rate_bps, balance_cents, utang_cents, total_patronage_cents,
                is_active, last_transaction_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&member.id)
        .bind(&member.rfid_card_number)
        .bind(&member.pin_hash)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(member.role)
        .bind(member.patronage_rate_bps)
        .bind(member.balance_cents)
        .bind(member.utang_cents)
        .bind(member.total_patronage_cents)
        .bind(member.is_active)
        .bind(member.last_transaction_at)
        .bind(member.created_at)
        .bind(member.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stores a new PIN hash for a member.
    pub async fn set_pin_hash(&self, id: &str, pin_hash: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query("UPDATE members SET pin_hash = ?, updated_at = ? WHERE id = ?")
            .bind(pin_hash)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Member", id));
        }

        Ok(())
    }

    // =========================================================================
    // Unit-of-work primitives (used by the account ledger and engines)
    // =========================================================================

    /// Re-reads a member row inside the caller's open unit of work.
    pub async fn get_for_update(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Member>> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?");
        let member = sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(member)
    }

    /// Writes all three money pools in one statement inside the caller's
    /// unit of work. The account ledger computes the new values from a row
    /// it read under the member lock, so no update is ever lost.
    pub async fn update_money(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        balance_cents: i64,
        utang_cents: i64,
        total_patronage_cents: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE members
            SET balance_cents = ?, utang_cents = ?, total_patronage_cents = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(balance_cents)
        .bind(utang_cents)
        .bind(total_patronage_cents)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Member", id));
        }

        Ok(())
    }

    /// Stamps the member's last-transaction timestamp inside the caller's
    /// unit of work.
    pub async fn touch_last_transaction(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE members SET last_transaction_at = ?, updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(at)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Appends one balance movement row inside the caller's unit of work.
    pub async fn insert_movement(
        &self,
        conn: &mut SqliteConnection,
        movement: &BalanceMovement,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO balance_movements (
                id, member_id, kind, amount_cents,
                balance_before_cents, balance_after_cents,
                utang_before_cents, utang_after_cents,
                notes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.member_id)
        .bind(movement.kind)
        .bind(movement.amount_cents)
        .bind(movement.balance_before_cents)
        .bind(movement.balance_after_cents)
        .bind(movement.utang_before_cents)
        .bind(movement.utang_after_cents)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Lists the movement trail for a member, newest first.
    pub async fn movements(&self, member_id: &str, limit: u32) -> DbResult<Vec<BalanceMovement>> {
        let movements = sqlx::query_as::<_, BalanceMovement>(
            r#"
            SELECT id, member_id, kind, amount_cents,
                   balance_before_cents, balance_after_cents,
                   utang_before_cents, utang_after_cents,
                   notes, created_at
            FROM balance_movements
            WHERE member_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(member_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

/// Helper to generate a new member ID.
pub fn generate_member_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new balance movement ID.
pub fn generate_movement_id() -> String {
    Uuid::new_v4().to_string()
}
