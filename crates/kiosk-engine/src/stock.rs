//! # Stock Ledger
//!
//! Exclusive, audited mutation of product stock counters.
//!
//! Every mutation happens inside the caller's open unit of work, after the
//! caller has taken the row locks for the products involved. Validation
//! runs **after** the rows are re-read under those locks, which eliminates
//! the check-then-act race:
//!
//! ```text
//! lock products (sorted) ──► re-read stock ──► validate ──► decrement
//!                                                            │
//!                                              one movement row per product
//! ```
//!
//! A failure for any single product fails the whole call; the caller's
//! transaction rollback discards whatever was already written.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use kiosk_core::validation::validate_quantity;
use kiosk_core::{Product, ProductSnapshot, StockMovement, StockMovementKind};
use kiosk_db::repository::product::generate_movement_id;
use kiosk_db::{Database, ProductRepository};

use crate::error::{EngineError, EngineResult};

/// The stock side of the consistency core.
#[derive(Debug, Clone)]
pub struct StockLedger {
    products: ProductRepository,
}

impl StockLedger {
    pub fn new(db: &Database) -> Self {
        StockLedger {
            products: db.products(),
        }
    }

    /// Reserves and decrements stock for a whole cart.
    ///
    /// `lines` are `(product_id, quantity)` pairs; a cart may repeat a
    /// product, in which case the quantities are summed before the stock
    /// check. Products are loaded in ascending id order - the same order
    /// the caller acquired its locks in.
    ///
    /// ## Errors
    /// - `Validation` - a quantity outside (0, 1000]
    /// - `NotFound` - a product missing or inactive
    /// - `InsufficientStock` - any product short on stock
    ///
    /// On error nothing is kept: the caller's unit of work rolls back.
    pub async fn reserve_and_decrement(
        &self,
        conn: &mut SqliteConnection,
        lines: &[(String, i64)],
        note: &str,
    ) -> EngineResult<Vec<ProductSnapshot>> {
        for (_, quantity) in lines {
            validate_quantity(*quantity)?;
        }

        // Total requested per product; BTreeMap keeps ids sorted.
        let mut requested: BTreeMap<String, i64> = BTreeMap::new();
        for (product_id, quantity) in lines {
            *requested.entry(product_id.clone()).or_insert(0) += quantity;
        }

        let ids: Vec<String> = requested.keys().cloned().collect();
        let products = self.products.fetch_for_update(conn, &ids).await?;

        // Validate everything before touching anything.
        for id in &ids {
            if !products.iter().any(|p| &p.id == id) {
                return Err(EngineError::not_found("Product", id.clone()));
            }
        }
        for product in &products {
            if !product.is_active {
                return Err(EngineError::not_found("Product", product.id.clone()));
            }
            let quantity = requested[&product.id];
            if product.stock_quantity < quantity {
                return Err(EngineError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock_quantity,
                    requested: quantity,
                });
            }
        }

        let now = Utc::now();
        let mut snapshots = Vec::with_capacity(products.len());

        for product in &products {
            let quantity = requested[&product.id];
            let stock_after = product.stock_quantity - quantity;

            self.products.set_stock(conn, &product.id, stock_after).await?;
            self.products
                .insert_movement(
                    conn,
                    &StockMovement {
                        id: generate_movement_id(),
                        product_id: product.id.clone(),
                        kind: StockMovementKind::Out,
                        delta: -quantity,
                        stock_before: product.stock_quantity,
                        stock_after,
                        notes: note.to_string(),
                        created_at: now,
                    },
                )
                .await?;

            debug!(
                product_id = %product.id,
                quantity = quantity,
                stock_after = stock_after,
                "Stock reserved"
            );

            snapshots.push(snapshot_of(product, quantity, stock_after));
        }

        Ok(snapshots)
    }

    /// Restocks a product (the refund-path inverse of a sale line).
    ///
    /// The increment is unconditional - there is no upper bound, and a
    /// product may end up with more stock than it ever had, since returns
    /// aren't validated against what was sold elsewhere.
    pub async fn restock(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        note: &str,
    ) -> EngineResult<ProductSnapshot> {
        validate_quantity(quantity)?;

        let products = self
            .products
            .fetch_for_update(conn, &[product_id.to_string()])
            .await?;
        let product = products
            .first()
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        let stock_after = product.stock_quantity + quantity;

        self.products.set_stock(conn, &product.id, stock_after).await?;
        self.products
            .insert_movement(
                conn,
                &StockMovement {
                    id: generate_movement_id(),
                    product_id: product.id.clone(),
                    kind: StockMovementKind::In,
                    delta: quantity,
                    stock_before: product.stock_quantity,
                    stock_after,
                    notes: note.to_string(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        debug!(product_id = %product.id, quantity = quantity, stock_after = stock_after, "Restocked");

        Ok(snapshot_of(product, quantity, stock_after))
    }

    /// Applies a manual stock correction (admin path).
    ///
    /// The delta is signed; a correction may not drive stock negative.
    pub async fn adjust(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        delta: i64,
        note: &str,
    ) -> EngineResult<ProductSnapshot> {
        if delta == 0 {
            return Err(kiosk_core::ValidationError::MustBePositive {
                field: "delta".to_string(),
            }
            .into());
        }

        let products = self
            .products
            .fetch_for_update(conn, &[product_id.to_string()])
            .await?;
        let product = products
            .first()
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        let stock_after = product.stock_quantity + delta;
        if stock_after < 0 {
            return Err(EngineError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock_quantity,
                requested: -delta,
            });
        }

        self.products.set_stock(conn, &product.id, stock_after).await?;
        self.products
            .insert_movement(
                conn,
                &StockMovement {
                    id: generate_movement_id(),
                    product_id: product.id.clone(),
                    kind: StockMovementKind::Adjustment,
                    delta,
                    stock_before: product.stock_quantity,
                    stock_after,
                    notes: note.to_string(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        Ok(snapshot_of(product, delta.abs(), stock_after))
    }
}

fn snapshot_of(product: &Product, quantity: i64, stock_after: i64) -> ProductSnapshot {
    ProductSnapshot {
        product_id: product.id.clone(),
        name: product.name.clone(),
        barcode: product.barcode.clone(),
        unit_price_cents: product.price_cents,
        quantity,
        stock_before: product.stock_quantity,
        stock_after,
        low_stock: stock_after <= product.low_stock_threshold,
    }
}
