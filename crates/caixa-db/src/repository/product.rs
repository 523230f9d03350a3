//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Search by SKU, name or barcode
//! - CRUD operations with soft delete
//! - Stock deltas and the low-stock list
//!
//! ## Stock Updates
//! ```text
//! ❌ Absolute:  UPDATE products SET current_stock = 7
//! ✅ Delta:     UPDATE products SET current_stock = current_stock - 3
//!
//! Two concurrent sales of 3 and 2 units always end at -5 with deltas.
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use caixa_core::validation::{
    validate_price_cents, validate_product_name, validate_search_query, validate_sku,
    validate_tax_rate_bps,
};
use caixa_core::Product;

use super::new_id;
use crate::error::{DbError, DbResult};

pub(crate) const PRODUCT_COLUMNS: &str = "id, tenant_id, sku, barcode, name, description, \
     category, price_cents, cost_cents, tax_rate_bps, track_inventory, allow_negative_stock, \
     current_stock, min_stock, is_active, created_at, updated_at";

/// Fields a client provides to create or replace a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub sku: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default = "default_true")]
    pub track_inventory: bool,
    #[serde(default)]
    pub allow_negative_stock: bool,
    #[serde(default)]
    pub current_stock: Option<i64>,
    #[serde(default)]
    pub min_stock: Option<i64>,
}

fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Validates and normalizes the input.
    fn validated(&self) -> DbResult<ProductInput> {
        let mut input = self.clone();
        input.sku = validate_sku(&self.sku)?;
        input.name = validate_product_name(&self.name)?;
        validate_price_cents(self.price_cents)?;
        if let Some(cost) = self.cost_cents {
            validate_price_cents(cost)?;
        }
        validate_tax_rate_bps(self.tax_rate_bps)?;
        input.barcode = self
            .barcode
            .as_ref()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        Ok(input)
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        ProductRepository { pool, tenant_id }
    }

    /// Searches active products by SKU, name or barcode (case-insensitive
    /// substring). An empty query lists active products by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, limit = %limit, "Searching products");

        let pattern = format!("%{}%", query.to_lowercase());
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ?1 AND is_active = 1 \
             AND (?2 = '%%' OR lower(sku) LIKE ?2 OR lower(name) LIKE ?2 OR barcode LIKE ?2) \
             ORDER BY CASE WHEN lower(sku) = ?3 OR barcode = ?3 THEN 0 ELSE 1 END, name \
             LIMIT ?4"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&self.tenant_id)
            .bind(&pattern)
            .bind(query.to_lowercase())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Gets a product by ID, including soft-deleted ones.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND tenant_id = ?2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Like [`Self::get_by_id`], but a missing product is an error.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1 AND tenant_id = ?2");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku.trim())
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists for this tenant
    pub async fn insert(&self, input: &ProductInput) -> DbResult<Product> {
        let input = input.validated()?;
        debug!(sku = %input.sku, "Inserting product");

        if self.get_by_sku(&input.sku).await?.is_some() {
            return Err(DbError::duplicate("sku", &input.sku));
        }

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            sku: input.sku,
            barcode: input.barcode,
            name: input.name,
            description: input.description,
            category: input.category,
            price_cents: input.price_cents,
            cost_cents: input.cost_cents,
            tax_rate_bps: input.tax_rate_bps,
            track_inventory: input.track_inventory,
            allow_negative_stock: input.allow_negative_stock,
            current_stock: input.current_stock,
            min_stock: input.min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, barcode, name, description, category,
                price_cents, cost_cents, tax_rate_bps,
                track_inventory, allow_negative_stock, current_stock, min_stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.track_inventory)
        .bind(product.allow_negative_stock)
        .bind(product.current_stock)
        .bind(product.min_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Replaces the editable fields of a product. Stock goes through
    /// [`Self::adjust_stock`] and is not touched here.
    pub async fn update(&self, id: &str, input: &ProductInput) -> DbResult<Product> {
        let input = input.validated()?;
        debug!(id = %id, "Updating product");

        self.get(id).await?;
        if let Some(other) = self.get_by_sku(&input.sku).await? {
            if other.id != id {
                return Err(DbError::duplicate("sku", &input.sku));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?3,
                barcode = ?4,
                name = ?5,
                description = ?6,
                category = ?7,
                price_cents = ?8,
                cost_cents = ?9,
                tax_rate_bps = ?10,
                track_inventory = ?11,
                allow_negative_stock = ?12,
                min_stock = ?13,
                updated_at = ?14
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(&input.sku)
        .bind(&input.barcode)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.price_cents)
        .bind(input.cost_cents)
        .bind(input.tax_rate_bps)
        .bind(input.track_inventory)
        .bind(input.allow_negative_stock)
        .bind(input.min_stock)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get(id).await
    }

    /// Applies a stock delta (positive restock, negative shrinkage).
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        debug!(id = %id, delta = %delta, "Updating stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = COALESCE(current_stock, 0) + ?3,
                updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get(id).await
    }

    /// Soft-deletes a product. Past sales keep referencing it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?3 \
             WHERE id = ?1 AND tenant_id = ?2 AND is_active = 1",
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Active tracked products at or below their minimum stock, emptiest first.
    pub async fn low_stock(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ?1 AND is_active = 1 AND track_inventory = 1 \
             AND min_stock IS NOT NULL AND COALESCE(current_stock, 0) <= min_stock \
             ORDER BY COALESCE(current_stock, 0) - min_stock, name \
             LIMIT ?2"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&self.tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND is_active = 1",
        )
        .bind(&self.tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repository::test_support::db;

    pub(crate) fn input(sku: &str, name: &str, price: i64, stock: Option<i64>) -> ProductInput {
        ProductInput {
            sku: sku.to_string(),
            barcode: None,
            name: name.to_string(),
            description: None,
            category: Some("Mercearia".to_string()),
            price_cents: price,
            cost_cents: None,
            tax_rate_bps: 0,
            track_inventory: stock.is_some(),
            allow_negative_stock: false,
            current_stock: stock,
            min_stock: stock.map(|_| 2),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = db().await;
        let repo = db.products();

        let created = repo
            .insert(&input(" CAFE-500 ", "Café 500g", 1890, Some(10)))
            .await
            .unwrap();
        assert_eq!(created.sku, "CAFE-500");

        let fetched = repo.get(&created.id).await.unwrap();
        assert_eq!(fetched.name, "Café 500g");
        assert_eq!(fetched.price_cents, 1890);
        assert_eq!(fetched.current_stock, Some(10));
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = db().await;
        let repo = db.products();

        repo.insert(&input("PAO", "Pão", 100, None)).await.unwrap();
        let err = repo.insert(&input("PAO", "Pão 2", 100, None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let db = db().await;
        let err = db
            .products()
            .insert(&input("has space", "X", 100, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }

    #[tokio::test]
    async fn test_search() {
        let db = db().await;
        let repo = db.products();

        repo.insert(&input("CAFE-500", "Café Pilão 500g", 1890, None)).await.unwrap();
        repo.insert(&input("CAFE-250", "Café Melitta 250g", 990, None)).await.unwrap();
        repo.insert(&input("ACUCAR", "Açúcar 1kg", 550, None)).await.unwrap();

        assert_eq!(repo.search("cafe", 20).await.unwrap().len(), 2);
        assert_eq!(repo.search("MELITTA", 20).await.unwrap().len(), 1);
        assert_eq!(repo.search("", 20).await.unwrap().len(), 3);
        assert_eq!(repo.search("", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let db = db().await;
        let repo = db.products();

        let p = repo.insert(&input("LEITE", "Leite", 500, Some(4))).await.unwrap();
        let mut change = input("LEITE", "Leite Integral", 550, Some(99));
        change.min_stock = Some(1);

        let updated = repo.update(&p.id, &change).await.unwrap();
        assert_eq!(updated.name, "Leite Integral");
        assert_eq!(updated.price_cents, 550);
        assert_eq!(updated.current_stock, Some(4));

        let missing = repo.update("nope", &change).await.unwrap_err();
        assert!(matches!(missing, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_adjust_stock_and_low_stock() {
        let db = db().await;
        let repo = db.products();

        let p = repo.insert(&input("OVOS", "Ovos dúzia", 1200, Some(5))).await.unwrap();
        repo.insert(&input("ARROZ", "Arroz 5kg", 2500, Some(50))).await.unwrap();

        assert!(repo.low_stock(10).await.unwrap().is_empty());

        let after = repo.adjust_stock(&p.id, -3).await.unwrap();
        assert_eq!(after.current_stock, Some(2));

        let low = repo.low_stock(10).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "OVOS");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_search() {
        let db = db().await;
        let repo = db.products();

        let p = repo.insert(&input("SAL", "Sal", 300, None)).await.unwrap();
        repo.soft_delete(&p.id).await.unwrap();

        assert!(repo.search("sal", 10).await.unwrap().is_empty());
        assert!(!repo.get(&p.id).await.unwrap().is_active);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.soft_delete(&p.id).await.is_err());
    }
}
