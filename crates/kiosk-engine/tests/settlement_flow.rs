//! End-to-end settlement tests: VAT math on real carts, the payment
//! waterfall, atomicity on failure, and the last-unit race.

mod common;

use std::sync::Arc;

use kiosk_core::{BalanceMovementKind, MemberRole, PaymentMethod, TransactionStatus};
use kiosk_engine::{ActingIdentity, CartLine, EngineError, SettleRequest};

use common::{reload_member, reload_product, seed_member, seed_product, test_service};

fn cash_request(product_id: &str, quantity: i64, tendered: Option<i64>) -> SettleRequest {
    SettleRequest {
        member_id: None,
        items: vec![CartLine {
            product_id: product_id.to_string(),
            quantity,
        }],
        payment_method: PaymentMethod::Cash,
        pin: None,
        cash_tendered_cents: tendered,
    }
}

#[tokio::test]
async fn cash_settlement_computes_vat_and_change() {
    let service = test_service().await;
    // unit_price=55.00, qty=2, VAT 12% → total 110.00, vat 13.20, vatable 96.80
    let product = seed_product(&service, "8888888888881", "Coca Cola 1.5L", 5500, 100).await;

    let receipt = service
        .settle(
            cash_request(&product.id, 2, Some(12_000)),
            &ActingIdentity::guest(),
        )
        .await
        .unwrap();

    let txn = &receipt.transaction;
    assert_eq!(txn.total_cents, 11_000);
    assert_eq!(txn.vat_cents, 1_320);
    assert_eq!(txn.vatable_cents, 9_680);
    assert_eq!(txn.subtotal_cents, 11_000);
    assert_eq!(txn.status, TransactionStatus::Completed);
    assert_eq!(txn.payment_method, PaymentMethod::Cash);
    assert_eq!(txn.amount_paid_cents, 12_000);
    assert_eq!(receipt.change_cents, 1_000);

    // Item-level decomposition law
    let item = &receipt.items[0];
    assert_eq!(item.vat_cents + item.vatable_cents, item.total_cents);
    assert_eq!(item.unit_price_cents, 5500);

    // Stock decremented with an audit row
    let after = reload_product(&service, &product.id).await;
    assert_eq!(after.stock_quantity, 98);
    let movements = service.db().products().movements(&product.id, 10).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].delta, -2);
    assert_eq!(movements[0].stock_before, 100);
    assert_eq!(movements[0].stock_after, 98);
}

#[tokio::test]
async fn cash_exact_payment_assumed_when_tendered_omitted() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Nova Cheese", 2000, 10).await;

    let receipt = service
        .settle(cash_request(&product.id, 1, None), &ActingIdentity::guest())
        .await
        .unwrap();

    assert_eq!(receipt.transaction.amount_paid_cents, 2000);
    assert_eq!(receipt.change_cents, 0);
}

#[tokio::test]
async fn three_item_cart_aggregates_by_summation() {
    let service = test_service().await;
    // Three lines at 20.00 each: per item vat 2.40 / vatable 17.60;
    // transaction 60.00 / 7.20 / 52.80
    let a = seed_product(&service, "B-A", "Chippy BBQ", 2000, 10).await;
    let b = seed_product(&service, "B-B", "Nova Cheese", 2000, 10).await;
    let c = seed_product(&service, "B-C", "Piattos", 2000, 10).await;

    let request = SettleRequest {
        member_id: None,
        items: [&a, &b, &c]
            .iter()
            .map(|p| CartLine {
                product_id: p.id.clone(),
                quantity: 1,
            })
            .collect(),
        payment_method: PaymentMethod::Cash,
        pin: None,
        cash_tendered_cents: None,
    };

    let receipt = service
        .settle(request, &ActingIdentity::guest())
        .await
        .unwrap();

    for item in &receipt.items {
        assert_eq!(item.total_cents, 2000);
        assert_eq!(item.vat_cents, 240);
        assert_eq!(item.vatable_cents, 1760);
    }
    let txn = &receipt.transaction;
    assert_eq!(txn.total_cents, 6000);
    assert_eq!(txn.vat_cents, 720);
    assert_eq!(txn.vatable_cents, 5280);

    let item_sum: i64 = receipt.items.iter().map(|i| i.total_cents).sum();
    assert_eq!(txn.total_cents, item_sum);
    assert_eq!(txn.total_cents, txn.vat_cents + txn.vatable_cents);
}

#[tokio::test]
async fn insufficient_cash_aborts_cleanly() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Rice 5kg", 25_000, 5).await;

    let err = service
        .settle(
            cash_request(&product.id, 1, Some(20_000)),
            &ActingIdentity::guest(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InsufficientCash { .. }));

    // Nothing survived the rollback
    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 5);
    assert_eq!(service.db().transactions().count().await.unwrap(), 0);
    assert!(service
        .db()
        .products()
        .movements(&product.id, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn debit_settlement_from_sufficient_balance() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Coca Cola 1.5L", 5500, 100).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 50_000, Some("1234")).await;

    let request = SettleRequest {
        member_id: Some(member.id.clone()),
        items: vec![CartLine {
            product_id: product.id.clone(),
            quantity: 2,
        }],
        payment_method: PaymentMethod::Debit,
        pin: Some("1234".to_string()),
        cash_tendered_cents: None,
    };

    let receipt = service
        .settle(request, &ActingIdentity::member(member.id.clone()))
        .await
        .unwrap();

    let txn = &receipt.transaction;
    assert_eq!(txn.payment_method, PaymentMethod::Debit);
    assert_eq!(txn.amount_from_balance_cents, 11_000);
    assert_eq!(txn.amount_to_utang_cents, 0);

    let after = reload_member(&service, &member.id).await;
    assert_eq!(after.balance_cents, 39_000);
    assert_eq!(after.utang_cents, 0);
    // Patronage: 5% of subtotal 110.00 = 5.50
    assert_eq!(after.total_patronage_cents, 550);
    assert_eq!(txn.patronage_cents, 550);
    assert_eq!(txn.patronage_rate_bps, 500);
    assert!(after.last_transaction_at.is_some());

    // Exactly one deduction movement with before/after snapshots
    let movements = service.db().members().movements(&member.id, 10).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, BalanceMovementKind::Deduction);
    assert_eq!(movements[0].balance_before_cents, 50_000);
    assert_eq!(movements[0].balance_after_cents, 39_000);

    let summary = receipt.member.as_ref().unwrap();
    assert_eq!(summary.balance_before_cents, 50_000);
    assert_eq!(summary.balance_after_cents, 39_000);
}

#[tokio::test]
async fn debit_shortfall_splits_to_utang_and_downgrades_method() {
    let service = test_service().await;
    // balance 30.00, cart total 55.00 → from_balance 30.00, to_utang 25.00,
    // stored method credit
    let product = seed_product(&service, "B-1", "Coca Cola 1.5L", 5500, 100).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 3_000, Some("1234")).await;

    let request = SettleRequest {
        member_id: Some(member.id.clone()),
        items: vec![CartLine {
            product_id: product.id.clone(),
            quantity: 1,
        }],
        payment_method: PaymentMethod::Debit,
        pin: Some("1234".to_string()),
        cash_tendered_cents: None,
    };

    let receipt = service
        .settle(request, &ActingIdentity::member(member.id.clone()))
        .await
        .unwrap();

    let txn = &receipt.transaction;
    assert_eq!(txn.amount_from_balance_cents, 3_000);
    assert_eq!(txn.amount_to_utang_cents, 2_500);
    assert_eq!(txn.payment_method, PaymentMethod::Credit);

    let after = reload_member(&service, &member.id).await;
    assert_eq!(after.balance_cents, 0);
    assert_eq!(after.utang_cents, 2_500);

    // Two movements: the deduction and the utang spillover
    let movements = service.db().members().movements(&member.id, 10).await.unwrap();
    let kinds: Vec<BalanceMovementKind> = movements.iter().map(|m| m.kind).collect();
    assert!(kinds.contains(&BalanceMovementKind::Deduction));
    assert!(kinds.contains(&BalanceMovementKind::UtangAdded));
}

#[tokio::test]
async fn credit_settlement_always_grows_utang() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Rice 5kg", 25_000, 10).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 0, Some("1234")).await;

    let request = SettleRequest {
        member_id: Some(member.id.clone()),
        items: vec![CartLine {
            product_id: product.id.clone(),
            quantity: 1,
        }],
        payment_method: PaymentMethod::Credit,
        pin: Some("1234".to_string()),
        cash_tendered_cents: None,
    };

    let receipt = service
        .settle(request, &ActingIdentity::member(member.id.clone()))
        .await
        .unwrap();

    assert_eq!(receipt.transaction.amount_to_utang_cents, 25_000);
    assert_eq!(reload_member(&service, &member.id).await.utang_cents, 25_000);
}

#[tokio::test]
async fn failed_settlement_leaves_no_trace() {
    let service = test_service().await;
    let plenty = seed_product(&service, "B-1", "Nova Cheese", 2000, 100).await;
    let scarce = seed_product(&service, "B-2", "Bread Loaf", 4500, 1).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 50_000, Some("1234")).await;

    let request = SettleRequest {
        member_id: Some(member.id.clone()),
        items: vec![
            CartLine {
                product_id: plenty.id.clone(),
                quantity: 3,
            },
            CartLine {
                product_id: scarce.id.clone(),
                quantity: 2, // only 1 in stock
            },
        ],
        payment_method: PaymentMethod::Debit,
        pin: Some("1234".to_string()),
        cash_tendered_cents: None,
    };

    let err = service
        .settle(request, &ActingIdentity::member(member.id.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));

    // Stock, balances and the transaction table are untouched
    assert_eq!(reload_product(&service, &plenty.id).await.stock_quantity, 100);
    assert_eq!(reload_product(&service, &scarce.id).await.stock_quantity, 1);
    let after = reload_member(&service, &member.id).await;
    assert_eq!(after.balance_cents, 50_000);
    assert_eq!(after.total_patronage_cents, 0);
    assert_eq!(service.db().transactions().count().await.unwrap(), 0);
    assert!(service
        .db()
        .members()
        .movements(&member.id, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn repeated_product_lines_are_aggregated_for_the_stock_check() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Instant Noodles", 1200, 5).await;

    // 3 + 3 across two lines exceeds the 5 in stock even though each line
    // alone would pass.
    let request = SettleRequest {
        member_id: None,
        items: vec![
            CartLine {
                product_id: product.id.clone(),
                quantity: 3,
            },
            CartLine {
                product_id: product.id.clone(),
                quantity: 3,
            },
        ],
        payment_method: PaymentMethod::Cash,
        pin: None,
        cash_tendered_cents: None,
    };

    let err = service
        .settle(request, &ActingIdentity::guest())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));

    // 2 + 3 fits; the two lines stay separate items but the decrement is
    // one aggregated movement.
    let request = SettleRequest {
        member_id: None,
        items: vec![
            CartLine {
                product_id: product.id.clone(),
                quantity: 2,
            },
            CartLine {
                product_id: product.id.clone(),
                quantity: 3,
            },
        ],
        payment_method: PaymentMethod::Cash,
        pin: None,
        cash_tendered_cents: None,
    };
    let receipt = service
        .settle(request, &ActingIdentity::guest())
        .await
        .unwrap();

    assert_eq!(receipt.items.len(), 2);
    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 0);
    let movements = service.db().products().movements(&product.id, 10).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].delta, -5);
}

#[tokio::test]
async fn validation_rejects_bad_carts() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Sugar 1kg", 6000, 10).await;

    // Empty cart
    let err = service
        .settle(
            SettleRequest {
                member_id: None,
                items: vec![],
                payment_method: PaymentMethod::Cash,
                pin: None,
                cash_tendered_cents: None,
            },
            &ActingIdentity::guest(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Zero and over-cap quantities
    for quantity in [0, -1, 1001] {
        let err = service
            .settle(
                cash_request(&product.id, quantity, None),
                &ActingIdentity::guest(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "qty {quantity}");
    }
}

#[tokio::test]
async fn unknown_and_inactive_products_are_not_found() {
    let service = test_service().await;

    let err = service
        .settle(cash_request("no-such-id", 1, None), &ActingIdentity::guest())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));

    let product = seed_product(&service, "B-1", "Ghost Product", 1000, 10).await;
    // Deactivate directly; the settlement must refuse it.
    sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
        .bind(&product.id)
        .execute(service.db().pool())
        .await
        .unwrap();

    let err = service
        .settle(cash_request(&product.id, 1, None), &ActingIdentity::guest())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn member_payment_requires_scan_session_and_pin() {
    let service = test_service().await;
    let product = seed_product(&service, "B-1", "Coffee 3in1 Pack", 4500, 10).await;
    let member = seed_member(&service, "1001", MemberRole::Member, 50_000, Some("1234")).await;

    let request = |pin: Option<&str>| SettleRequest {
        member_id: Some(member.id.clone()),
        items: vec![CartLine {
            product_id: product.id.clone(),
            quantity: 1,
        }],
        payment_method: PaymentMethod::Debit,
        pin: pin.map(String::from),
        cash_tendered_cents: None,
    };

    // No member at all
    let err = service
        .settle(
            SettleRequest {
                member_id: None,
                items: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
                payment_method: PaymentMethod::Credit,
                pin: None,
                cash_tendered_cents: None,
            },
            &ActingIdentity::guest(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authentication(_)));

    // No scan in session context
    let err = service
        .settle(request(Some("1234")), &ActingIdentity::guest())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authentication(_)));

    // Scan present but PIN missing / wrong
    let acting = ActingIdentity::member(member.id.clone());
    let err = service.settle(request(None), &acting).await.unwrap_err();
    assert!(matches!(err, EngineError::Authentication(_)));
    let err = service
        .settle(request(Some("9999")), &acting)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authentication(_)));

    // Nothing was mutated along the way
    assert_eq!(reload_member(&service, &member.id).await.balance_cents, 50_000);
    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 10);

    // A cashier acting for the scanned member bypasses the PIN
    let staff = ActingIdentity::staff(MemberRole::Cashier, Some(member.id.clone()));
    let receipt = service.settle(request(None), &staff).await.unwrap();
    assert_eq!(receipt.transaction.amount_from_balance_cents, 4_500);
}

#[tokio::test]
async fn concurrent_settlements_racing_for_the_last_unit() {
    let service = Arc::new(test_service().await);
    let product = seed_product(&service, "B-1", "Milk Powder 300g", 18_000, 1).await;

    let spawn = |service: Arc<kiosk_engine::KioskService>, product_id: String| {
        tokio::spawn(async move {
            service
                .settle(cash_request(&product_id, 1, None), &ActingIdentity::guest())
                .await
        })
    };

    let a = spawn(Arc::clone(&service), product.id.clone());
    let b = spawn(Arc::clone(&service), product.id.clone());

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let stock_errors = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::InsufficientStock { .. })))
        .count();

    assert_eq!(successes, 1, "exactly one settlement wins the last unit");
    assert_eq!(stock_errors, 1, "the loser fails with insufficient stock");
    assert_eq!(reload_product(&service, &product.id).await.stock_quantity, 0);
}
