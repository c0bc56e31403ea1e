//! # Seed Data Generator
//!
//! Populates the database with sample members and products for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p kiosk-db --bin seed
//! cargo run -p kiosk-db --bin seed -- --db ./data/kiosk.db
//! ```

use chrono::Utc;
use std::env;
use uuid::Uuid;

use kiosk_core::{Member, MemberRole, Product};
use kiosk_db::{Database, DbConfig};

/// (rfid, first name, last name, role, balance in cents)
const MEMBERS: &[(&str, &str, &str, MemberRole, i64)] = &[
    ("1001", "Juan", "Dela Cruz", MemberRole::Member, 100_000),
    ("1002", "Maria", "Santos", MemberRole::Member, 50_000),
    ("1003", "Pedro", "Reyes", MemberRole::Member, 200_000),
    ("9001", "Ana", "Lim", MemberRole::Cashier, 0),
    ("9999", "Jose", "Garcia", MemberRole::Admin, 0),
];

/// (barcode, name, price in cents, stock)
const PRODUCTS: &[(&str, &str, i64, i64)] = &[
    ("8888888888881", "Coca Cola 1.5L", 5500, 100),
    ("8888888888882", "Sprite 1.5L", 5500, 100),
    ("8888888888883", "Royal 1.5L", 5000, 100),
    ("8888888888884", "Mineral Water 500ml", 1500, 200),
    ("8888888888885", "Piattos Cheese", 2500, 150),
    ("8888888888886", "Nova Cheese", 2000, 150),
    ("8888888888887", "Chippy BBQ", 2000, 150),
    ("8888888888888", "Rice 5kg", 25000, 50),
    ("8888888888889", "Sugar 1kg", 6000, 80),
    ("8888888888890", "Cooking Oil 1L", 12000, 60),
    ("8888888888891", "Instant Noodles", 1200, 300),
    ("8888888888892", "Canned Sardines", 3500, 100),
    ("8888888888893", "Coffee 3in1 Pack", 4500, 100),
    ("8888888888894", "Milk Powder 300g", 18000, 40),
    ("8888888888895", "Bread Loaf", 4500, 80),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./kiosk_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Coop Kiosk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./kiosk_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Coop Kiosk Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database, migrations applied");

    if db.products().count().await? > 0 {
        println!("⚠ Database already has products; skipping seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();

    for (rfid, first, last, role, balance) in MEMBERS {
        let member = Member {
            id: Uuid::new_v4().to_string(),
            rfid_card_number: rfid.to_string(),
            pin_hash: None,
            first_name: first.to_string(),
            last_name: last.to_string(),
            role: *role,
            patronage_rate_bps: Some(500),
            balance_cents: *balance,
            utang_cents: 0,
            total_patronage_cents: 0,
            is_active: true,
            last_transaction_at: None,
            created_at: now,
            updated_at: now,
        };
        db.members().insert(&member).await?;
        println!("  Member {} ({})", member.full_name(), rfid);
    }

    for (barcode, name, price_cents, stock) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            barcode: barcode.to_string(),
            name: name.to_string(),
            description: None,
            price_cents: *price_cents,
            // cost roughly 70% of selling price, like the store's margins
            cost_cents: price_cents * 7 / 10,
            stock_quantity: *stock,
            low_stock_threshold: 10,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await?;
        println!("  Product {} ({})", name, barcode);
    }

    println!();
    println!(
        "✓ Seeded {} members and {} products",
        MEMBERS.len(),
        PRODUCTS.len()
    );

    Ok(())
}
