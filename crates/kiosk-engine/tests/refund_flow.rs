//! End-to-end refund tests: reversibility, balance-only crediting, the
//! single-shot cancellation gate, and caller authorization.

mod common;

use kiosk_core::{BalanceMovementKind, MemberRole, PaymentMethod, TransactionStatus};
use kiosk_engine::{
    ActingIdentity, CartLine, EngineError, RefundRequest, SettleRequest, SettlementReceipt,
    REFUND_MARKER,
};

use common::{reload_member, reload_product, seed_member, seed_product, test_service};

async fn settle_debit(
    service: &kiosk_engine::KioskService,
    member_id: &str,
    product_id: &str,
    quantity: i64,
) -> SettlementReceipt {
    service
        .settle(
            SettleRequest {
                member_id: Some(member_id.to_string()),
                items: vec![CartLine {
                    product_id: product_id.to_string(),
                    quantity,
                }],
                payment_method: PaymentMethod::Debit,
                pin: Some("1234".to_string()),
                cash_tendered_cents: None,
            },
            &ActingIdentity::member(member_id.to_string()),
        )
        .await
        .unwrap()
}

fn cashier() -> ActingIdentity {
    ActingIdentity::staff(MemberRole::Cashier, None)
}

#[tokio::test]
async fn refund_restores_stock_and_credits_balance() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Coca Cola 1.5L", 5500, 100).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 50_000, Some("1234")).await;

    let sale = settle_debit(&service, &member.id, &product.id, 2).await;
    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 98);
    assert_eq!(reload_member(&service, &member.id).await.balance_cents, 39_000);

    let receipt = service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: Some("item damaged".to_string()),
            },
            &cashier(),
        )
        .await
        .unwrap();

    // Stock back to its pre-sale level, balance back up by the full total
    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 100);
    let after = reload_member(&service, &member.id).await;
    assert_eq!(after.balance_cents, 50_000);

    // Transaction state and markers
    let cancelled = service
        .db()
        .transactions()
        .get_by_id(&sale.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert!(cancelled.is_refund);
    assert_eq!(cancelled.notes, "Refunded. item damaged");

    // The balance movement records the deposit with both snapshots
    let movements = service.db().members().movements(&member.id, 10).await.unwrap();
    let deposit = movements
        .iter()
        .find(|m| m.kind == BalanceMovementKind::Deposit)
        .unwrap();
    assert_eq!(deposit.amount_cents, 11_000);
    assert_eq!(deposit.balance_before_cents, 39_000);
    assert_eq!(deposit.balance_after_cents, 50_000);
    assert!(deposit.notes.contains(&sale.transaction.transaction_number));

    // Restock audit row
    let stock_moves = service.db().products().movements(&product.id, 10).await.unwrap();
    assert!(stock_moves.iter().any(|m| m.delta == 2));

    // Receipt payload
    assert_eq!(receipt.refund_amount_cents, 11_000);
    assert!(receipt.text.contains("REFUND RECEIPT"));
    assert!(receipt.text.contains("Refunded to Member Balance"));
    assert!(receipt.text.contains("item damaged"));
    let summary = receipt.member.as_ref().unwrap();
    assert_eq!(summary.balance_before_cents, 39_000);
    assert_eq!(summary.balance_after_cents, 50_000);
}

#[tokio::test]
async fn refund_credits_balance_even_when_sale_was_on_utang() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Rice 5kg", 25_000, 10).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 0, Some("1234")).await;

    let sale = service
        .settle(
            SettleRequest {
                member_id: Some(member.id.clone()),
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
                payment_method: PaymentMethod::Credit,
                pin: Some("1234".to_string()),
                cash_tendered_cents: None,
            },
            &ActingIdentity::member(member.id.clone()),
        )
        .await
        .unwrap();
    assert_eq!(reload_member(&service, &member.id).await.utang_cents, 25_000);

    service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: None,
            },
            &cashier(),
        )
        .await
        .unwrap();

    // Money comes back as spendable balance; the utang stays owed.
    let after = reload_member(&service, &member.id).await;
    assert_eq!(after.balance_cents, 25_000);
    assert_eq!(after.utang_cents, 25_000);

    let cancelled = service
        .db()
        .transactions()
        .get_by_id(&sale.transaction.id)
        .await
        .unwrap()
        .unwrap();
    // Bare marker when no reason is given; reporting scans for this text.
    assert_eq!(cancelled.notes, REFUND_MARKER);
}

#[tokio::test]
async fn second_refund_fails_with_state_conflict() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Sugar 1kg", 6000, 10).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 10_000, Some("1234")).await;

    let sale = settle_debit(&service, &member.id, &product.id, 1).await;

    service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: None,
            },
            &cashier(),
        )
        .await
        .unwrap();

    let balance_after_first = reload_member(&service, &member.id).await.balance_cents;
    let stock_after_first = reload_product(&service, &product.id).await.stock_quantity;

    let err = service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: None,
            },
            &cashier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict { .. }));

    // No double credit, no double restock
    assert_eq!(
        reload_member(&service, &member.id).await.balance_cents,
        balance_after_first
    );
    assert_eq!(
        reload_product(&service, &product.id).await.stock_quantity,
        stock_after_first
    );
}

#[tokio::test]
async fn member_may_only_refund_their_own_transactions() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Bread Loaf", 4500, 10).await;
    let owner = seed_member(&service, "1001", MemberRole::Member, 10_000, Some("1234")).await;
    let other = seed_member(&service, "1002", MemberRole::Member, 10_000, Some("1234")).await;

    let sale = settle_debit(&service, &owner.id, &product.id, 1).await;

    // A different member is rejected before any mutation
    let err = service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: None,
            },
            &ActingIdentity::member(other.id.clone()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
    assert_eq!(
        service
            .db()
            .transactions()
            .get_by_id(&sale.transaction.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        TransactionStatus::Completed
    );

    // The owner succeeds
    service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: None,
            },
            &ActingIdentity::member(owner.id.clone()),
        )
        .await
        .unwrap();
    assert_eq!(reload_member(&service, &owner.id).await.balance_cents, 10_000);
}

#[tokio::test]
async fn guest_cash_sale_refund_restocks_without_a_member() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Mineral Water 500ml", 1500, 20).await;

    let sale = service
        .settle(
            SettleRequest {
                member_id: None,
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 4,
                }],
                payment_method: PaymentMethod::Cash,
                pin: None,
                cash_tendered_cents: None,
            },
            &ActingIdentity::guest(),
        )
        .await
        .unwrap();
    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 16);

    let receipt = service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: None,
            },
            &cashier(),
        )
        .await
        .unwrap();

    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 20);
    assert!(receipt.member.is_none());
    assert_eq!(receipt.transaction.status, TransactionStatus::Cancelled);
}

#[tokio::test]
async fn refund_skips_restock_for_deleted_products() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Ghost Product", 2000, 10).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 10_000, Some("1234")).await;

    let sale = settle_debit(&service, &member.id, &product.id, 2).await;

    // Hard-delete the product; the item keeps its snapshot and a nulled
    // product reference.
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(&product.id)
        .execute(service.db().pool())
        .await
        .unwrap();

    let receipt = service
        .refund(
            RefundRequest {
                transaction_id: sale.transaction.id.clone(),
                reason: None,
            },
            &cashier(),
        )
        .await
        .unwrap();

    // The balance credit still happened; the item line survives on the
    // receipt even though nothing could be restocked.
    assert_eq!(reload_member(&service, &member.id).await.balance_cents, 10_000);
    assert_eq!(receipt.items.len(), 1);
    assert_eq!(receipt.items[0].product_name, "Ghost Product");
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let service = test_service().await;

    let err = service
        .refund(
            RefundRequest {
                transaction_id: "no-such-transaction".to_string(),
                reason: None,
            },
            &cashier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}
