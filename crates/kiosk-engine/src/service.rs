//! # Kiosk Service Facade
//!
//! The operations the core exposes to its collaborators (kiosk UI, mobile
//! API, admin screens). Each method validates input, enforces the caller's
//! authority, and delegates to the engines and ledgers.
//!
//! | Operation | Collaborator |
//! |---|---|
//! | `settle` | kiosk checkout |
//! | `refund` | refund screen (staff or owning member) |
//! | `lookup_product_by_barcode` | barcode scanner |
//! | `search_products` | kiosk search box |
//! | `authenticate_by_rfid` | RFID reader |
//! | `refill_balance` | admin top-up screen |
//! | `settle_utang` | cashier utang collection |
//! | `set_member_pin` | member management |

use std::sync::Arc;

use tracing::info;

use kiosk_core::validation::{
    validate_amount_cents, validate_barcode, validate_rfid, validate_search_query,
};
use kiosk_core::{Member, MemberRole, Money, Product};
use kiosk_db::{Database, DbError};

use crate::account::MemberLedger;
use crate::config::KioskConfig;
use crate::error::{EngineError, EngineResult};
use crate::identity::ActingIdentity;
use crate::locks::{LockKey, RowLocks};
use crate::refund::{RefundEngine, RefundReceipt, RefundRequest};
use crate::settlement::{MemberSummary, SettleRequest, SettlementEngine, SettlementReceipt};

/// Maximum results returned by a product search.
const SEARCH_LIMIT: u32 = 50;

/// The settlement core's front door.
///
/// Cheap to clone; collaborators share one instance so every settlement
/// goes through the same row-lock registry.
#[derive(Clone)]
pub struct KioskService {
    db: Database,
    locks: Arc<RowLocks>,
    config: KioskConfig,
}

impl KioskService {
    pub fn new(db: Database, config: KioskConfig) -> Self {
        KioskService {
            db,
            locks: Arc::new(RowLocks::new()),
            config,
        }
    }

    /// Access to the underlying database (read-model consumers).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Sale / Refund
    // =========================================================================

    /// Settles a cart. See [`crate::settlement`].
    pub async fn settle(
        &self,
        request: SettleRequest,
        acting: &ActingIdentity,
    ) -> EngineResult<SettlementReceipt> {
        SettlementEngine::new(&self.db, &self.locks, &self.config)
            .settle(request, acting)
            .await
    }

    /// Refunds a completed transaction. See [`crate::refund`].
    pub async fn refund(
        &self,
        request: RefundRequest,
        acting: &ActingIdentity,
    ) -> EngineResult<RefundReceipt> {
        RefundEngine::new(&self.db, &self.locks, &self.config)
            .refund(request, acting)
            .await
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Looks up an active product by scanned barcode.
    pub async fn lookup_product_by_barcode(&self, barcode: &str) -> EngineResult<Product> {
        validate_barcode(barcode)?;

        self.db
            .products()
            .find_by_barcode(barcode.trim())
            .await?
            .ok_or_else(|| EngineError::not_found("Product", barcode))
    }

    /// Searches active products. Queries shorter than two characters return
    /// no results rather than erroring.
    pub async fn search_products(&self, query: &str) -> EngineResult<Vec<Product>> {
        let Some(query) = validate_search_query(query)? else {
            return Ok(Vec::new());
        };

        Ok(self.db.products().search(&query, SEARCH_LIMIT).await?)
    }

    /// Authenticates a member by RFID card scan.
    pub async fn authenticate_by_rfid(&self, card_number: &str) -> EngineResult<Member> {
        validate_rfid(card_number)?;

        self.db
            .members()
            .find_by_rfid(card_number.trim())
            .await?
            .ok_or_else(|| EngineError::not_found("Member", card_number))
    }

    // =========================================================================
    // Admin Operations
    // =========================================================================

    /// Adds balance to a member's card. Admin only.
    pub async fn refill_balance(
        &self,
        member_id: &str,
        amount_cents: i64,
        notes: Option<&str>,
        acting: &ActingIdentity,
    ) -> EngineResult<MemberSummary> {
        if acting.role != MemberRole::Admin {
            return Err(EngineError::Authorization(
                "only admins can refill balances".to_string(),
            ));
        }
        validate_amount_cents(amount_cents)?;

        let note = match notes.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => format!("Balance refill by admin. {n}"),
            None => "Balance refill by admin".to_string(),
        };

        let _row_guard = self
            .locks
            .lock_all(vec![LockKey::Member(member_id.to_string())])
            .await;

        let ledger = MemberLedger::new(&self.db);
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let mut member = self
            .db
            .members()
            .get_for_update(&mut tx, member_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| EngineError::not_found("Member", member_id))?;
        let before = member.clone();

        ledger
            .credit(&mut tx, &mut member, Money::from_cents(amount_cents), &note)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(member_id = %member.id, amount_cents = amount_cents, "Balance refilled");
        Ok(MemberSummary::from_states(&before, &member))
    }

    /// Records a member paying off utang at the counter. Staff only.
    pub async fn settle_utang(
        &self,
        member_id: &str,
        amount_cents: i64,
        notes: Option<&str>,
        acting: &ActingIdentity,
    ) -> EngineResult<MemberSummary> {
        if !acting.role.is_staff() {
            return Err(EngineError::Authorization(
                "only staff can record utang payments".to_string(),
            ));
        }
        validate_amount_cents(amount_cents)?;

        let note = match notes.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => format!("Utang payment. {n}"),
            None => "Utang payment".to_string(),
        };

        let _row_guard = self
            .locks
            .lock_all(vec![LockKey::Member(member_id.to_string())])
            .await;

        let ledger = MemberLedger::new(&self.db);
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let mut member = self
            .db
            .members()
            .get_for_update(&mut tx, member_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| EngineError::not_found("Member", member_id))?;
        let before = member.clone();

        ledger
            .reduce_utang(&mut tx, &mut member, Money::from_cents(amount_cents), &note)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(member_id = %member.id, amount_cents = amount_cents, "Utang payment recorded");
        Ok(MemberSummary::from_states(&before, &member))
    }

    /// Assigns a member's 4-digit PIN. Staff, or the member themself.
    pub async fn set_member_pin(
        &self,
        member_id: &str,
        pin: &str,
        acting: &ActingIdentity,
    ) -> EngineResult<()> {
        let is_self = acting.member_id.as_deref() == Some(member_id);
        if !acting.role.is_staff() && !is_self {
            return Err(EngineError::Authorization(
                "you can only change your own PIN".to_string(),
            ));
        }

        let member = self
            .db
            .members()
            .get_by_id(member_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| EngineError::not_found("Member", member_id))?;

        let hash = crate::pin::hash_pin(pin)?;
        self.db.members().set_pin_hash(&member.id, &hash).await?;

        info!(member_id = %member.id, "Member PIN updated");
        Ok(())
    }
}
