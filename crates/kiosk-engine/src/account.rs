//! # Member Account Ledger
//!
//! Audited mutation of a member's three money pools: spendable balance,
//! outstanding utang, and cumulative patronage.
//!
//! Every operation:
//! - takes the member row the caller re-read under the member lock,
//! - requires a strictly positive amount,
//! - writes the new pool values inside the caller's unit of work,
//! - appends exactly one balance movement with before/after snapshots of
//!   both pools (patronage accrual excepted - it touches neither pool).
//!
//! The in-memory `Member` is updated alongside the row so callers can keep
//! chaining operations on it within the same unit of work.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use kiosk_core::validation::validate_amount_cents;
use kiosk_core::{BalanceMovement, BalanceMovementKind, Member, Money};
use kiosk_db::repository::member::generate_movement_id;
use kiosk_db::{Database, MemberRepository};

use crate::error::{EngineError, EngineResult};

/// The member-account side of the consistency core.
#[derive(Debug, Clone)]
pub struct MemberLedger {
    members: MemberRepository,
}

impl MemberLedger {
    pub fn new(db: &Database) -> Self {
        MemberLedger {
            members: db.members(),
        }
    }

    /// Adds to the member's spendable balance (refill, refund). No upper
    /// bound.
    pub async fn credit(
        &self,
        conn: &mut SqliteConnection,
        member: &mut Member,
        amount: Money,
        notes: &str,
    ) -> EngineResult<BalanceMovement> {
        validate_amount_cents(amount.cents())?;

        let balance_before = member.balance_cents;
        member.balance_cents += amount.cents();

        self.persist(conn, member).await?;
        let movement = self
            .record(
                conn,
                member,
                BalanceMovementKind::Deposit,
                amount,
                balance_before,
                member.utang_cents,
                notes,
            )
            .await?;

        debug!(member_id = %member.id, amount = amount.cents(), "Balance credited");
        Ok(movement)
    }

    /// Deducts from the member's balance; fails without mutating when the
    /// balance is short.
    pub async fn debit(
        &self,
        conn: &mut SqliteConnection,
        member: &mut Member,
        amount: Money,
        notes: &str,
    ) -> EngineResult<BalanceMovement> {
        validate_amount_cents(amount.cents())?;

        if member.balance_cents < amount.cents() {
            return Err(EngineError::InsufficientFunds {
                required_cents: amount.cents(),
                available_cents: member.balance_cents,
            });
        }

        let balance_before = member.balance_cents;
        member.balance_cents -= amount.cents();

        self.persist(conn, member).await?;
        let movement = self
            .record(
                conn,
                member,
                BalanceMovementKind::Deduction,
                amount,
                balance_before,
                member.utang_cents,
                notes,
            )
            .await?;

        debug!(member_id = %member.id, amount = amount.cents(), "Balance debited");
        Ok(movement)
    }

    /// Grows the member's utang. Unconditional: credit payments are always
    /// allowed to grow the pool.
    pub async fn add_utang(
        &self,
        conn: &mut SqliteConnection,
        member: &mut Member,
        amount: Money,
        notes: &str,
    ) -> EngineResult<BalanceMovement> {
        validate_amount_cents(amount.cents())?;

        let utang_before = member.utang_cents;
        member.utang_cents += amount.cents();

        self.persist(conn, member).await?;
        let movement = self
            .record(
                conn,
                member,
                BalanceMovementKind::UtangAdded,
                amount,
                member.balance_cents,
                utang_before,
                notes,
            )
            .await?;

        debug!(member_id = %member.id, amount = amount.cents(), "Utang added");
        Ok(movement)
    }

    /// Reduces the member's utang (member paid off credit); fails without
    /// mutating when the outstanding utang is short.
    pub async fn reduce_utang(
        &self,
        conn: &mut SqliteConnection,
        member: &mut Member,
        amount: Money,
        notes: &str,
    ) -> EngineResult<BalanceMovement> {
        validate_amount_cents(amount.cents())?;

        if member.utang_cents < amount.cents() {
            return Err(EngineError::InsufficientUtang {
                required_cents: amount.cents(),
                outstanding_cents: member.utang_cents,
            });
        }

        let utang_before = member.utang_cents;
        member.utang_cents -= amount.cents();

        self.persist(conn, member).await?;
        let movement = self
            .record(
                conn,
                member,
                BalanceMovementKind::UtangPayment,
                amount,
                member.balance_cents,
                utang_before,
                notes,
            )
            .await?;

        debug!(member_id = %member.id, amount = amount.cents(), "Utang reduced");
        Ok(movement)
    }

    /// Accrues patronage. Monotonic, unconditional, and outside the
    /// balance/utang movement trail: patronage is a rebate accumulator,
    /// not spendable money.
    pub async fn accrue_patronage(
        &self,
        conn: &mut SqliteConnection,
        member: &mut Member,
        amount: Money,
    ) -> EngineResult<()> {
        validate_amount_cents(amount.cents())?;

        member.total_patronage_cents += amount.cents();
        self.persist(conn, member).await?;

        debug!(member_id = %member.id, amount = amount.cents(), "Patronage accrued");
        Ok(())
    }

    /// Writes all three pools from the in-memory member.
    async fn persist(&self, conn: &mut SqliteConnection, member: &Member) -> EngineResult<()> {
        self.members
            .update_money(
                conn,
                &member.id,
                member.balance_cents,
                member.utang_cents,
                member.total_patronage_cents,
            )
            .await?;
        Ok(())
    }

    /// Appends the movement row for an already-applied mutation.
    async fn record(
        &self,
        conn: &mut SqliteConnection,
        member: &Member,
        kind: BalanceMovementKind,
        amount: Money,
        balance_before: i64,
        utang_before: i64,
        notes: &str,
    ) -> EngineResult<BalanceMovement> {
        let movement = BalanceMovement {
            id: generate_movement_id(),
            member_id: member.id.clone(),
            kind,
            amount_cents: amount.cents(),
            balance_before_cents: balance_before,
            balance_after_cents: member.balance_cents,
            utang_before_cents: utang_before,
            utang_after_cents: member.utang_cents,
            notes: notes.to_string(),
            created_at: Utc::now(),
        };

        self.members.insert_movement(conn, &movement).await?;
        Ok(movement)
    }
}
