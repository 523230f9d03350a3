//! # Sale Repository
//!
//! Database operations for POS sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. QUOTE (no database)                                                 │
//! │     └── cart::quote(cart) → lines + totals                              │
//! │                                                                         │
//! │  2. RECORD (one transaction)                                            │
//! │     └── record_sale() → Sale { status: Completed }                      │
//! │         ├── reprice lines from the catalog, check stock                 │
//! │         ├── stock deltas (returns put stock back)                       │
//! │         ├── sale + sale_items                                           │
//! │         └── ledger entry, or a purchase for on-account sales            │
//! │                                                                         │
//! │  3. (OPTIONAL) VOID                                                     │
//! │     └── void_sale() → Sale { status: Voided }                           │
//! │         ├── stock restored                                              │
//! │         └── ledger reversal / unpaid purchase removed                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use caixa_core::cart::{self, Cart, CartLine, Quote, Tender};
use caixa_core::{
    CoreError, EntryKind, EntrySource, Money, PaymentMethod, Product, Purchase, Sale, SaleItem,
    SaleStatus, TaxMode,
};

use super::customer::{apply_credit, customer_exists, insert_purchase, PURCHASE_COLUMNS};
use super::ledger::{generated_entry, insert_entry};
use super::product::PRODUCT_COLUMNS;
use super::{new_id, timestamp_bounds};
use crate::error::{DbError, DbResult};
use crate::retry::{with_retry, RetryPolicy};

pub(crate) const SALE_COLUMNS: &str = "id, tenant_id, receipt_number, status, customer_id, \
     payment_method, gross_cents, discount_cents, subtotal_cents, tax_cents, total_cents, \
     received_cents, change_cents, notes, created_at, voided_at";

pub(crate) const SALE_ITEM_COLUMNS: &str = "id, sale_id, product_id, sku_snapshot, name_snapshot, \
     unit_price_cents, quantity, gross_cents, discount_cents, tax_cents, net_cents, created_at";

/// Everything the POS sends to close a sale.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub cart: Cart,
    pub payment_method: PaymentMethod,
    /// Cash handed over. Ignored for other methods.
    #[serde(default)]
    pub received_cents: Option<i64>,
    /// Required for on-account sales.
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub tender: Tender,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// Works out what changes hands for `total` paid with `method`.
///
/// Only cash can be over-tendered. Card and PIX are charged for the exact
/// total, and a net return is refunded in full. On-account sales take no
/// money now.
pub fn settle(method: PaymentMethod, total: Money, received: Option<Money>) -> DbResult<Tender> {
    match method {
        PaymentMethod::OnAccount => {
            if !total.is_positive() {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: "on-account sales must have a positive total".to_string(),
                }
                .into());
            }
            Ok(Tender {
                total,
                received: Money::zero(),
                change: Money::zero(),
                refund: Money::zero(),
            })
        }
        PaymentMethod::Cash => {
            let received = received.unwrap_or_else(|| total.max(Money::zero()));
            Ok(cart::tender(total, received)?)
        }
        _ => Ok(cart::tender(total, total.max(Money::zero()))?),
    }
}

async fn load_product(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND tenant_id = ?2");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Next receipt number for `day`: `YYYY-MM-DD-NNNN`.
async fn next_receipt_number(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    day: NaiveDate,
) -> DbResult<String> {
    let (start, end) = timestamp_bounds(day, day);
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sales WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3",
    )
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .fetch_one(conn)
    .await?;

    Ok(format!("{}-{:04}", day, count + 1))
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    tenant_id: String,
    retry: RetryPolicy,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, tenant_id: String, retry: RetryPolicy) -> Self {
        SaleRepository {
            pool,
            tenant_id,
            retry,
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Records a completed sale.
    ///
    /// Prices, names and tax rates are taken from the catalog at checkout;
    /// the cart supplies quantities and discounts.
    ///
    /// ## Returns
    /// * `Err(CoreError::EmptyCart)` - nothing to sell
    /// * `Err(CoreError::InsufficientStock)` - a tracked product ran out
    /// * `Err(CoreError::InsufficientPayment)` - cash does not cover the total
    /// * `Err(CoreError::CustomerRequired)` - on-account sale without a customer
    pub async fn record_sale(&self, input: &CheckoutInput, mode: TaxMode) -> DbResult<SaleReceipt> {
        if input.cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        if input.payment_method == PaymentMethod::OnAccount && input.customer_id.is_none() {
            return Err(CoreError::CustomerRequired.into());
        }
        input.cart.validate()?;

        with_retry(&self.retry, "record_sale", || self.record_sale_once(input, mode)).await
    }

    async fn record_sale_once(&self, input: &CheckoutInput, mode: TaxMode) -> DbResult<SaleReceipt> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(customer_id) = &input.customer_id {
            if !customer_exists(&mut *tx, &self.tenant_id, customer_id).await? {
                return Err(CoreError::CustomerNotFound(customer_id.clone()).into());
            }
        }

        // Reprice from the catalog and check stock per product
        let mut products: HashMap<String, Product> = HashMap::new();
        let mut cart = input.cart.clone();
        for line in &mut cart.lines {
            if !products.contains_key(&line.product_id) {
                let product = load_product(&mut *tx, &self.tenant_id, &line.product_id)
                    .await?
                    .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
                products.insert(product.id.clone(), product);
            }
            let product = &products[&line.product_id];
            if !product.is_active && line.quantity > 0 {
                return Err(CoreError::ProductNotFound(line.product_id.clone()).into());
            }
            *line = CartLine {
                quantity: line.quantity,
                discount: line.discount,
                ..CartLine::from_product(product)
            };
        }

        let mut sold: HashMap<&str, i64> = HashMap::new();
        for line in cart.lines.iter().filter(|l| l.quantity > 0) {
            *sold.entry(line.product_id.as_str()).or_default() += line.quantity;
        }
        for (product_id, quantity) in &sold {
            let product = &products[*product_id];
            if !product.can_sell(*quantity) {
                return Err(CoreError::InsufficientStock {
                    sku: product.sku.clone(),
                    available: product.current_stock.unwrap_or(0),
                    requested: *quantity,
                }
                .into());
            }
        }

        let Quote { lines, totals } = cart::quote(&cart, mode)?;
        let tender = settle(
            input.payment_method,
            totals.total,
            input.received_cents.map(Money::from_cents),
        )?;

        let sale = Sale {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            receipt_number: next_receipt_number(&mut *tx, &self.tenant_id, now.date_naive())
                .await?,
            status: SaleStatus::Completed,
            customer_id: input.customer_id.clone(),
            payment_method: input.payment_method,
            gross_cents: totals.gross.cents(),
            discount_cents: (totals.line_discounts + totals.cart_discount).cents(),
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            received_cents: tender.received.cents(),
            change_cents: tender.change.cents(),
            notes: input
                .notes
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at: now,
            voided_at: None,
        };

        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, receipt_number, status, customer_id, payment_method,
                gross_cents, discount_cents, subtotal_cents, tax_cents, total_cents,
                received_cents, change_cents, notes, created_at, voided_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.receipt_number)
        .bind(sale.status)
        .bind(&sale.customer_id)
        .bind(sale.payment_method)
        .bind(sale.gross_cents)
        .bind(sale.discount_cents)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.received_cents)
        .bind(sale.change_cents)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.voided_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: Some(line.product_id.clone()),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price.cents(),
                quantity: line.quantity,
                gross_cents: line.gross.cents(),
                discount_cents: line.discount().cents(),
                tax_cents: line.tax.cents(),
                net_cents: line.net.cents(),
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
                    quantity, gross_cents, discount_cents, tax_cents, net_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.gross_cents)
            .bind(item.discount_cents)
            .bind(item.tax_cents)
            .bind(item.net_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            // Returns carry a negative quantity and put stock back
            sqlx::query(
                "UPDATE products SET current_stock = COALESCE(current_stock, 0) - ?2, \
                 updated_at = ?3 WHERE id = ?1 AND track_inventory = 1",
            )
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        if sale.payment_method == PaymentMethod::OnAccount {
            let customer_id = sale.customer_id.clone().ok_or(CoreError::CustomerRequired)?;
            let purchase = Purchase {
                id: new_id(),
                tenant_id: self.tenant_id.clone(),
                customer_id: customer_id.clone(),
                sale_id: Some(sale.id.clone()),
                description: format!("Venda {}", sale.receipt_number),
                amount_cents: sale.total_cents,
                paid_cents: 0,
                created_at: now,
                settled_at: None,
            };
            insert_purchase(&mut *tx, &purchase).await?;
            apply_credit(&mut *tx, &self.tenant_id, &customer_id, now).await?;
        } else if !sale.total().is_zero() {
            let kind = if sale.total().is_positive() {
                EntryKind::Income
            } else {
                EntryKind::Expense
            };
            let entry = generated_entry(
                &self.tenant_id,
                kind,
                EntrySource::Sale,
                sale.total().abs(),
                format!("Venda {} ({})", sale.receipt_number, sale.payment_method),
                &sale.id,
            );
            insert_entry(&mut *tx, &entry).await?;
        }

        tx.commit().await?;

        info!(
            id = %sale.id,
            receipt_number = %sale.receipt_number,
            total = sale.total_cents,
            method = %sale.payment_method,
            "Sale completed"
        );

        Ok(SaleReceipt {
            sale,
            items,
            tender,
        })
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Voids a completed sale, putting stock back and reversing its cash
    /// flow.
    ///
    /// ## Returns
    /// * `Err(CoreError::InvalidSaleStatus)` - already voided
    /// * `Err(CoreError::SaleHasPayments)` - on-account sale the customer
    ///   already paid something towards
    pub async fn void_sale(&self, id: &str) -> DbResult<Sale> {
        with_retry(&self.retry, "void_sale", || self.void_sale_once(id)).await
    }

    async fn void_sale_once(&self, id: &str) -> DbResult<Sale> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1 AND tenant_id = ?2");
        let mut sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;

        if sale.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale.id,
                current_status: sale.status.to_string(),
            }
            .into());
        }

        if sale.payment_method.moves_cash() {
            if !sale.total().is_zero() {
                let kind = if sale.total().is_positive() {
                    EntryKind::Expense
                } else {
                    EntryKind::Income
                };
                let entry = generated_entry(
                    &self.tenant_id,
                    kind,
                    EntrySource::SaleVoid,
                    sale.total().abs(),
                    format!("Cancelamento da venda {}", sale.receipt_number),
                    &sale.id,
                );
                insert_entry(&mut *tx, &entry).await?;
            }
        } else {
            let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE sale_id = ?1");
            let purchases = sqlx::query_as::<_, Purchase>(&sql)
                .bind(&sale.id)
                .fetch_all(&mut *tx)
                .await?;
            if purchases.iter().any(|p| p.paid_cents > 0) {
                return Err(CoreError::SaleHasPayments { sale_id: sale.id }.into());
            }
            sqlx::query("DELETE FROM purchases WHERE sale_id = ?1")
                .bind(&sale.id)
                .execute(&mut *tx)
                .await?;
        }

        let sql = format!("SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1");
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(&sale.id)
            .fetch_all(&mut *tx)
            .await?;
        for item in &items {
            let Some(product_id) = &item.product_id else {
                continue;
            };
            sqlx::query(
                "UPDATE products SET current_stock = COALESCE(current_stock, 0) + ?2, \
                 updated_at = ?3 WHERE id = ?1 AND track_inventory = 1",
            )
            .bind(product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE sales SET status = ?2, voided_at = ?3 WHERE id = ?1")
            .bind(&sale.id)
            .bind(SaleStatus::Voided)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        sale.status = SaleStatus::Voided;
        sale.voided_at = Some(now);
        info!(id = %sale.id, receipt_number = %sale.receipt_number, "Sale voided");
        Ok(sale)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> DbResult<SaleDetail> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1 AND tenant_id = ?2");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        let items = self.get_items(id).await?;
        Ok(SaleDetail { sale, items })
    }

    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id"
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Sales created on days `[from, to]`, newest first. Includes voided ones.
    pub async fn list(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<Sale>> {
        let (start, end) = timestamp_bounds(from, to);
        debug!(%from, %to, "Listing sales");

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3 \
             ORDER BY created_at DESC"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(&self.tenant_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::customer::tests::customer;
    use crate::repository::product::tests::input;
    use crate::repository::test_support::db;
    use crate::Database;
    use caixa_core::cart::Discount;

    async fn product(db: &Database, sku: &str, price: i64, stock: Option<i64>) -> Product {
        db.products()
            .insert(&input(sku, sku, price, stock))
            .await
            .unwrap()
    }

    fn cart_of(lines: &[(&Product, i64)]) -> Cart {
        let mut cart = Cart::new();
        for (product, qty) in lines {
            cart.add(CartLine::from_product(product), *qty).unwrap();
        }
        cart
    }

    fn checkout(cart: Cart, method: PaymentMethod, received: Option<i64>) -> CheckoutInput {
        CheckoutInput {
            cart,
            payment_method: method,
            received_cents: received,
            customer_id: None,
            notes: None,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn test_settle_rules() {
        let t = settle(PaymentMethod::Cash, Money::from_cents(1750), Some(Money::from_cents(2000)))
            .unwrap();
        assert_eq!(t.change.cents(), 250);

        let t = settle(PaymentMethod::Pix, Money::from_cents(1750), Some(Money::from_cents(9999)))
            .unwrap();
        assert_eq!(t.received.cents(), 1750);
        assert_eq!(t.change, Money::zero());

        let t = settle(PaymentMethod::DebitCard, Money::from_cents(-500), None).unwrap();
        assert_eq!(t.refund.cents(), 500);
        assert_eq!(t.change.cents(), 500);

        assert!(settle(PaymentMethod::OnAccount, Money::from_cents(-1), None).is_err());
        assert!(settle(PaymentMethod::Cash, Money::from_cents(100), Some(Money::from_cents(50))).is_err());
    }

    #[tokio::test]
    async fn test_record_cash_sale() {
        let db = db().await;
        let cafe = product(&db, "CAFE", 1890, Some(10)).await;
        let pao = product(&db, "PAO", 75, None).await;

        let mut input = checkout(cart_of(&[(&cafe, 2), (&pao, 10)]), PaymentMethod::Cash, Some(5000));
        input.cart.set_cart_discount(Some(Discount::Flat { cents: 30 })).unwrap();

        let receipt = db.sales().record_sale(&input, TaxMode::Exclusive).await.unwrap();
        assert_eq!(receipt.sale.gross_cents, 4530);
        assert_eq!(receipt.sale.discount_cents, 30);
        assert_eq!(receipt.sale.total_cents, 4500);
        assert_eq!(receipt.sale.change_cents, 500);
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.sale.receipt_number, format!("{}-0001", today()));

        let stocked = db.products().get(&cafe.id).await.unwrap();
        assert_eq!(stocked.current_stock, Some(8));

        let ledger = db.ledger().list(today(), today()).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, EntryKind::Income);
        assert_eq!(ledger[0].amount_cents, 4500);

        let detail = db.sales().get(&receipt.sale.id).await.unwrap();
        assert_eq!(detail.items.len(), 2);

        let second = db
            .sales()
            .record_sale(&checkout(cart_of(&[(&pao, 1)]), PaymentMethod::Pix, None), TaxMode::Exclusive)
            .await
            .unwrap();
        assert_eq!(second.sale.receipt_number, format!("{}-0002", today()));
    }

    #[tokio::test]
    async fn test_catalog_price_wins() {
        let db = db().await;
        let cafe = product(&db, "CAFE", 1890, None).await;

        let mut cart = cart_of(&[(&cafe, 1)]);
        cart.lines[0].unit_price = Money::from_cents(1);

        let receipt = db
            .sales()
            .record_sale(&checkout(cart, PaymentMethod::Pix, None), TaxMode::Exclusive)
            .await
            .unwrap();
        assert_eq!(receipt.sale.total_cents, 1890);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let db = db().await;
        let ovos = product(&db, "OVOS", 1200, Some(3)).await;

        let err = db
            .sales()
            .record_sale(&checkout(cart_of(&[(&ovos, 4)]), PaymentMethod::Cash, None), TaxMode::Exclusive)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 3, requested: 4, .. })
        ));

        assert_eq!(db.products().get(&ovos.id).await.unwrap().current_stock, Some(3));
        assert!(db.sales().list(today(), today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_net_return_refunds_and_restocks() {
        let db = db().await;
        let leite = product(&db, "LEITE", 500, Some(5)).await;

        let receipt = db
            .sales()
            .record_sale(&checkout(cart_of(&[(&leite, -2)]), PaymentMethod::Cash, Some(0)), TaxMode::Exclusive)
            .await
            .unwrap();
        assert_eq!(receipt.sale.total_cents, -1000);
        assert_eq!(receipt.tender.refund.cents(), 1000);
        assert_eq!(db.products().get(&leite.id).await.unwrap().current_stock, Some(7));

        let ledger = db.ledger().list(today(), today()).await.unwrap();
        assert_eq!(ledger[0].kind, EntryKind::Expense);
        assert_eq!(ledger[0].amount_cents, 1000);
    }

    #[tokio::test]
    async fn test_on_account_sale_creates_purchase() {
        let db = db().await;
        let arroz = product(&db, "ARROZ", 2500, None).await;
        let c = customer(&db, "Dona Lúcia").await;

        let mut input = checkout(cart_of(&[(&arroz, 2)]), PaymentMethod::OnAccount, None);
        assert!(matches!(
            db.sales().record_sale(&input, TaxMode::Exclusive).await,
            Err(DbError::Domain(CoreError::CustomerRequired))
        ));

        input.customer_id = Some(c.id.clone());
        let receipt = db.sales().record_sale(&input, TaxMode::Exclusive).await.unwrap();
        assert_eq!(receipt.sale.received_cents, 0);

        let open = db.customers().purchases(&c.id, true).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].amount_cents, 5000);
        assert_eq!(open[0].sale_id.as_deref(), Some(receipt.sale.id.as_str()));
        assert!(db.ledger().list(today(), today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_on_account_sale_uses_customer_credit() {
        let db = db().await;
        let arroz = product(&db, "ARROZ", 2500, None).await;
        let c = customer(&db, "Dona Rita").await;
        let customers = db.customers();

        customers
            .add_purchase(
                &c.id,
                &crate::repository::customer::PurchaseInput {
                    description: "Fiado antigo".into(),
                    amount_cents: 1000,
                },
            )
            .await
            .unwrap();
        customers
            .register_payment(
                &c.id,
                &crate::repository::customer::PaymentInput {
                    amount_cents: 2000,
                    method: PaymentMethod::Cash,
                    paid_on: None,
                },
            )
            .await
            .unwrap();

        let mut input = checkout(cart_of(&[(&arroz, 1)]), PaymentMethod::OnAccount, None);
        input.customer_id = Some(c.id.clone());
        let receipt = db.sales().record_sale(&input, TaxMode::Exclusive).await.unwrap();

        let open = customers.purchases(&c.id, true).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].sale_id.as_deref(), Some(receipt.sale.id.as_str()));
        assert_eq!(open[0].paid_cents, 1000);

        let balance = customers.balance(&c.id, today()).await.unwrap();
        assert_eq!(balance.balance.outstanding.cents(), 1500);
        assert_eq!(balance.credit, Money::zero());

        // Part of it is already paid from credit
        assert!(matches!(
            db.sales().void_sale(&receipt.sale.id).await,
            Err(DbError::Domain(CoreError::SaleHasPayments { .. }))
        ));
    }

    #[tokio::test]
    async fn test_void_reverses_stock_and_ledger() {
        let db = db().await;
        let cafe = product(&db, "CAFE", 1000, Some(10)).await;

        let receipt = db
            .sales()
            .record_sale(&checkout(cart_of(&[(&cafe, 3)]), PaymentMethod::Cash, None), TaxMode::Exclusive)
            .await
            .unwrap();

        let voided = db.sales().void_sale(&receipt.sale.id).await.unwrap();
        assert_eq!(voided.status, SaleStatus::Voided);
        assert!(voided.voided_at.is_some());
        assert_eq!(db.products().get(&cafe.id).await.unwrap().current_stock, Some(10));

        let ledger = db.ledger().list(today(), today()).await.unwrap();
        let net: i64 = ledger.iter().map(|e| caixa_core::ledger::signed_amount(e).cents()).sum();
        assert_eq!(net, 0);

        assert!(matches!(
            db.sales().void_sale(&receipt.sale.id).await,
            Err(DbError::Domain(CoreError::InvalidSaleStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn test_void_on_account_with_payment_is_refused() {
        let db = db().await;
        let arroz = product(&db, "ARROZ", 2500, None).await;
        let c = customer(&db, "Seu Antônio").await;

        let mut input = checkout(cart_of(&[(&arroz, 1)]), PaymentMethod::OnAccount, None);
        input.customer_id = Some(c.id.clone());
        let receipt = db.sales().record_sale(&input, TaxMode::Exclusive).await.unwrap();

        db.customers()
            .register_payment(
                &c.id,
                &crate::repository::customer::PaymentInput {
                    amount_cents: 1000,
                    method: PaymentMethod::Cash,
                    paid_on: None,
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            db.sales().void_sale(&receipt.sale.id).await,
            Err(DbError::Domain(CoreError::SaleHasPayments { .. }))
        ));
    }

    #[tokio::test]
    async fn test_empty_cart_and_unknown_product() {
        let db = db().await;
        assert!(matches!(
            db.sales()
                .record_sale(&checkout(Cart::new(), PaymentMethod::Cash, None), TaxMode::Exclusive)
                .await,
            Err(DbError::Domain(CoreError::EmptyCart))
        ));

        let mut cart = Cart::new();
        cart.add(CartLine::new("ghost", "GHOST", "Ghost", Money::from_cents(100), 0), 1)
            .unwrap();
        assert!(matches!(
            db.sales()
                .record_sale(&checkout(cart, PaymentMethod::Cash, None), TaxMode::Exclusive)
                .await,
            Err(DbError::Domain(CoreError::ProductNotFound(_)))
        ));
    }
}
