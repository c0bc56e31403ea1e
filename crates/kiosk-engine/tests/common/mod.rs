//! Shared fixtures for the engine integration tests.
#![allow(dead_code)] // not every test binary uses every fixture

use chrono::Utc;
use uuid::Uuid;

use kiosk_core::{Member, MemberRole, Product};
use kiosk_db::{Database, DbConfig};
use kiosk_engine::{pin::hash_pin, KioskConfig, KioskService};

/// A service over a fresh in-memory database.
pub async fn test_service() -> KioskService {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    KioskService::new(db, KioskConfig::default())
}

/// Inserts a product and returns it.
pub async fn seed_product(
    service: &KioskService,
    barcode: &str,
    name: &str,
    price_cents: i64,
    stock: i64,
) -> Product {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        barcode: barcode.to_string(),
        name: name.to_string(),
        description: None,
        price_cents,
        cost_cents: price_cents * 7 / 10,
        stock_quantity: stock,
        low_stock_threshold: 10,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    service.db().products().insert(&product).await.unwrap();
    product
}

/// Inserts a member and returns it. `pin` stores a hashed PIN.
pub async fn seed_member(
    service: &KioskService,
    rfid: &str,
    role: MemberRole,
    balance_cents: i64,
    pin: Option<&str>,
) -> Member {
    let now = Utc::now();
    let member = Member {
        id: Uuid::new_v4().to_string(),
        rfid_card_number: rfid.to_string(),
        pin_hash: pin.map(|p| hash_pin(p).unwrap()),
        first_name: "Juan".to_string(),
        last_name: "Dela Cruz".to_string(),
        role,
        patronage_rate_bps: Some(500),
        balance_cents,
        utang_cents: 0,
        total_patronage_cents: 0,
        is_active: true,
        last_transaction_at: None,
        created_at: now,
        updated_at: now,
    };
    service.db().members().insert(&member).await.unwrap();
    member
}

/// Re-reads a member row.
pub async fn reload_member(service: &KioskService, id: &str) -> Member {
    service.db().members().get_by_id(id).await.unwrap().unwrap()
}

/// Re-reads a product row.
pub async fn reload_product(service: &KioskService, id: &str) -> Product {
    service.db().products().get_by_id(id).await.unwrap().unwrap()
}
