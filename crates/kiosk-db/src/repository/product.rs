//! # Product Repository
//!
//! Database operations for products and the stock-movement audit trail.
//!
//! Plain reads and inserts run against the pool; everything the stock
//! ledger does during a settlement or refund takes an explicit
//! `&mut SqliteConnection` so it lands inside the caller's unit of work.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kiosk_core::{Product, StockMovement};

/// Column list shared by every product SELECT.
const PRODUCT_COLUMNS: &str = "id, barcode, name, description, price_cents, cost_cents, \
     stock_quantity, low_stock_threshold, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets an active product by barcode (the kiosk scan path).
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ? AND is_active = 1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Searches active products by name substring; numeric queries also
    /// match barcode substrings. Results ordered by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        debug!(query = %query, limit = %limit, "Searching products");

        let pattern = format!("%{}%", query);

        let products = if query.chars().all(|c| c.is_ascii_digit()) {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE is_active = 1 AND (barcode LIKE ? OR name LIKE ?) \
                 ORDER BY name LIMIT ?"
            );
            sqlx::query_as::<_, Product>(&sql)
                .bind(&pattern)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        } else {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE is_active = 1 AND name LIKE ? \
                 ORDER BY name LIMIT ?"
            );
            sqlx::query_as::<_, Product>(&sql)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        };

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - barcode already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(barcode = %product.barcode, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, barcode, name, description,
                price_cents, cost_cents,
                stock_quantity, low_stock_threshold,
                is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts active products (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Unit-of-work primitives (used by the stock ledger)
    // =========================================================================

    /// Loads product rows by ID **in ascending id order**, inside the
    /// caller's open unit of work.
    ///
    /// The ordering matches the engine's lock acquisition order, so every
    /// code path that touches several products observes them in the same
    /// sequence.
    pub async fn fetch_for_update(
        &self,
        conn: &mut SqliteConnection,
        ids: &[String],
    ) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ({placeholders}) ORDER BY id"
        );

        let mut query = sqlx::query_as::<_, Product>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&mut *conn).await?)
    }

    /// Writes a product's new stock level inside the caller's unit of work.
    ///
    /// The `CHECK (stock_quantity >= 0)` constraint backstops the ledger's
    /// own validation.
    pub async fn set_stock(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        stock_quantity: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(stock_quantity)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Appends one stock movement row inside the caller's unit of work.
    pub async fn insert_movement(
        &self,
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, kind, delta,
                stock_before, stock_after, notes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.kind)
        .bind(movement.delta)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Lists the movement trail for a product, newest first.
    pub async fn movements(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, kind, delta, stock_before, stock_after, notes, created_at
            FROM stock_movements
            WHERE product_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new stock movement ID.
pub fn generate_movement_id() -> String {
    Uuid::new_v4().to_string()
}
