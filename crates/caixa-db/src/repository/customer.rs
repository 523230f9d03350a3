//! # Customer Repository
//!
//! Customers, their on-account purchases, and the payments that settle them.
//!
//! ## Payment Flow
//! ```text
//! register_payment(customer, R$ 50,00)
//!      │
//!      ▼  BEGIN
//! load open purchases ──► pendency::allocate (oldest first)
//!      │
//!      ├── UPDATE purchases.paid_cents (+ settled_at when settled)
//!      ├── INSERT pendency_payments
//!      ├── INSERT payment_allocations (one per touched purchase)
//!      └── INSERT ledger_entries (income, pendency_payment)
//!      │
//!      ▼  COMMIT
//! PaymentReceipt { payment, allocation }
//! ```
//!
//! Anything left after the last open purchase is stored on the payment as
//! `unapplied_cents` and reported as customer credit. The next purchase put on
//! the customer's account is paid from that credit first, oldest payment
//! first, in the same transaction that stores the purchase.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use caixa_core::pendency::{self, Allocation, OpenPurchase, PendencyBalance};
use caixa_core::validation::{
    validate_customer_name, validate_description, validate_payment_amount,
    validate_positive_amount,
};
use caixa_core::{
    CoreError, Customer, EntryKind, EntrySource, Money, PaymentMethod, PendencyPayment,
    Purchase, ValidationError,
};

use super::ledger::{generated_entry, insert_entry};
use super::new_id;
use crate::error::{DbError, DbResult};
use crate::retry::{with_retry, RetryPolicy};

const CUSTOMER_COLUMNS: &str =
    "id, tenant_id, name, phone, email, notes, is_active, created_at, updated_at";

pub(crate) const PURCHASE_COLUMNS: &str = "id, tenant_id, customer_id, sale_id, description, \
     amount_cents, paid_cents, created_at, settled_at";

const PAYMENT_COLUMNS: &str = "id, tenant_id, customer_id, method, amount_cents, applied_cents, \
     unapplied_cents, paid_on, created_at";

// =============================================================================
// Inputs and Outputs
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A purchase put on the customer's account outside the POS.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseInput {
    pub description: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Defaults to today.
    #[serde(default)]
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: PendencyPayment,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerBalance {
    pub customer: Customer,
    pub balance: PendencyBalance,
    /// Sum of payment amounts that found no open purchase.
    pub credit: Money,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Inserts `purchase` on an open connection or transaction.
pub(crate) async fn insert_purchase(conn: &mut SqliteConnection, purchase: &Purchase) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO purchases (
            id, tenant_id, customer_id, sale_id, description,
            amount_cents, paid_cents, created_at, settled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&purchase.id)
    .bind(&purchase.tenant_id)
    .bind(&purchase.customer_id)
    .bind(&purchase.sale_id)
    .bind(&purchase.description)
    .bind(purchase.amount_cents)
    .bind(purchase.paid_cents)
    .bind(purchase.created_at)
    .bind(purchase.settled_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Open purchases of `customer_id` on an open connection or transaction.
async fn open_purchases(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    customer_id: &str,
) -> DbResult<Vec<OpenPurchase>> {
    let sql = format!(
        "SELECT {PURCHASE_COLUMNS} FROM purchases \
         WHERE tenant_id = ?1 AND customer_id = ?2 AND paid_cents < amount_cents"
    );
    let open = sqlx::query_as::<_, Purchase>(&sql)
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(conn)
        .await?
        .iter()
        .map(Purchase::to_open)
        .collect();

    Ok(open)
}

/// Applies `allocation` to the purchases and records it against `payment_id`.
///
/// The payment row must already exist.
async fn write_allocation(
    conn: &mut SqliteConnection,
    payment_id: &str,
    allocation: &Allocation,
    now: DateTime<Utc>,
) -> DbResult<()> {
    for line in &allocation.lines {
        sqlx::query(
            "UPDATE purchases SET paid_cents = paid_cents + ?2, \
             settled_at = COALESCE(?3, settled_at) WHERE id = ?1",
        )
        .bind(&line.purchase_id)
        .bind(line.applied.cents())
        .bind(line.settles.then_some(now))
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO payment_allocations (id, payment_id, purchase_id, applied_cents) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(new_id())
        .bind(payment_id)
        .bind(&line.purchase_id)
        .bind(line.applied.cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Spends the customer's credit on their open purchases.
///
/// Credit is taken from the oldest payments first. What a payment covers is
/// recorded as allocation rows against it and moved from `unapplied_cents` to
/// `applied_cents`. No ledger entry is written: the cash came in with the
/// payment.
///
/// ## Returns
/// The credit spent, zero when there was none or nothing was open.
pub(crate) async fn apply_credit(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    customer_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Money> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM pendency_payments \
         WHERE tenant_id = ?1 AND customer_id = ?2 AND unapplied_cents > 0 \
         ORDER BY paid_on, created_at, id"
    );
    let credits = sqlx::query_as::<_, PendencyPayment>(&sql)
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;
    if credits.is_empty() {
        return Ok(Money::zero());
    }

    let mut open = open_purchases(&mut *conn, tenant_id, customer_id).await?;
    let mut spent = Money::zero();

    for payment in &credits {
        if open.is_empty() {
            break;
        }

        let allocation = pendency::allocate(Money::from_cents(payment.unapplied_cents), &open)?;
        write_allocation(&mut *conn, &payment.id, &allocation, now).await?;

        sqlx::query(
            "UPDATE pendency_payments SET applied_cents = applied_cents + ?2, \
             unapplied_cents = unapplied_cents - ?2 WHERE id = ?1",
        )
        .bind(&payment.id)
        .bind(allocation.applied.cents())
        .execute(&mut *conn)
        .await?;

        for line in &allocation.lines {
            if let Some(purchase) = open.iter_mut().find(|p| p.id == line.purchase_id) {
                purchase.paid += line.applied;
            }
        }
        open.retain(|p| p.remaining().is_positive());
        spent += allocation.applied;
    }

    if spent.is_positive() {
        info!(customer_id = %customer_id, spent = spent.cents(), "Customer credit applied");
    }
    Ok(spent)
}

/// Whether an active customer `id` exists for `tenant_id`.
pub(crate) async fn customer_exists(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM customers WHERE id = ?1 AND tenant_id = ?2 AND is_active = 1",
    )
    .bind(id)
    .bind(tenant_id)
    .fetch_one(conn)
    .await?;

    Ok(count > 0)
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
    tenant_id: String,
    retry: RetryPolicy,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool, tenant_id: String, retry: RetryPolicy) -> Self {
        CustomerRepository {
            pool,
            tenant_id,
            retry,
        }
    }

    pub async fn create(&self, input: &CustomerInput) -> DbResult<Customer> {
        let now = Utc::now();
        let customer = Customer {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            name: validate_customer_name(&input.name)?,
            phone: trimmed(&input.phone),
            email: trimmed(&input.email),
            notes: trimmed(&input.notes),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, name, phone, email, notes, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.notes)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %customer.id, "Customer created");
        Ok(customer)
    }

    /// Active customers by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE tenant_id = ?1 AND is_active = 1 ORDER BY name"
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(&self.tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    pub async fn get(&self, id: &str) -> DbResult<Customer> {
        let sql =
            format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1 AND tenant_id = ?2");
        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn update(&self, id: &str, input: &CustomerInput) -> DbResult<Customer> {
        let name = validate_customer_name(&input.name)?;
        debug!(id = %id, "Updating customer");

        let result = sqlx::query(
            "UPDATE customers SET name = ?3, phone = ?4, email = ?5, notes = ?6, updated_at = ?7 \
             WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(&name)
        .bind(trimmed(&input.phone))
        .bind(trimmed(&input.email))
        .bind(trimmed(&input.notes))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get(id).await
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    /// Puts a purchase on the customer's account.
    pub async fn add_purchase(&self, customer_id: &str, input: &PurchaseInput) -> DbResult<Purchase> {
        validate_positive_amount("amount_cents", input.amount_cents)?;
        let description = validate_description(&input.description)?;

        with_retry(&self.retry, "add_purchase", || {
            self.add_purchase_once(customer_id, &description, input.amount_cents)
        })
        .await
    }

    async fn add_purchase_once(
        &self,
        customer_id: &str,
        description: &str,
        amount_cents: i64,
    ) -> DbResult<Purchase> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if !customer_exists(&mut *tx, &self.tenant_id, customer_id).await? {
            return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
        }

        let purchase = Purchase {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            customer_id: customer_id.to_string(),
            sale_id: None,
            description: description.to_string(),
            amount_cents,
            paid_cents: 0,
            created_at: now,
            settled_at: None,
        };
        insert_purchase(&mut *tx, &purchase).await?;
        let credit = apply_credit(&mut *tx, &self.tenant_id, customer_id, now).await?;

        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1");
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(&purchase.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            id = %purchase.id,
            customer_id = %customer_id,
            amount = purchase.amount_cents,
            from_credit = credit.cents(),
            "Purchase added"
        );
        Ok(purchase)
    }

    /// The customer's purchases, oldest first.
    pub async fn purchases(&self, customer_id: &str, open_only: bool) -> DbResult<Vec<Purchase>> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases \
             WHERE tenant_id = ?1 AND customer_id = ?2 AND (?3 = 0 OR paid_cents < amount_cents) \
             ORDER BY created_at, id"
        );
        let purchases = sqlx::query_as::<_, Purchase>(&sql)
            .bind(&self.tenant_id)
            .bind(customer_id)
            .bind(open_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(purchases)
    }

    pub async fn payments(&self, customer_id: &str) -> DbResult<Vec<PendencyPayment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM pendency_payments \
             WHERE tenant_id = ?1 AND customer_id = ?2 ORDER BY paid_on, created_at"
        );
        let payments = sqlx::query_as::<_, PendencyPayment>(&sql)
            .bind(&self.tenant_id)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Receives a payment from a customer and allocates it to their open
    /// purchases, oldest first.
    ///
    /// ## Returns
    /// * `Err(CoreError::CustomerNotFound)` - unknown or inactive customer
    /// * `Err(CoreError::NothingOutstanding)` - no open purchases
    pub async fn register_payment(
        &self,
        customer_id: &str,
        input: &PaymentInput,
    ) -> DbResult<PaymentReceipt> {
        validate_payment_amount(input.amount_cents)?;
        if input.method == PaymentMethod::OnAccount {
            return Err(ValidationError::NotAllowed {
                field: "method".into(),
                allowed: vec![
                    PaymentMethod::Cash.to_string(),
                    PaymentMethod::Pix.to_string(),
                    PaymentMethod::DebitCard.to_string(),
                    PaymentMethod::CreditCard.to_string(),
                ],
            }
            .into());
        }

        with_retry(&self.retry, "register_payment", || {
            self.register_payment_once(customer_id, input)
        })
        .await
    }

    async fn register_payment_once(
        &self,
        customer_id: &str,
        input: &PaymentInput,
    ) -> DbResult<PaymentReceipt> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !customer_exists(&mut *tx, &self.tenant_id, customer_id).await? {
            return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
        }

        // Credit left by an earlier overpayment pays first
        apply_credit(&mut *tx, &self.tenant_id, customer_id, now).await?;
        let open = open_purchases(&mut *tx, &self.tenant_id, customer_id).await?;

        if open.is_empty() {
            return Err(CoreError::NothingOutstanding {
                customer_id: customer_id.to_string(),
            }
            .into());
        }

        let amount = Money::from_cents(input.amount_cents);
        let allocation = pendency::allocate(amount, &open)?;

        let payment = PendencyPayment {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            customer_id: customer_id.to_string(),
            method: input.method,
            amount_cents: amount.cents(),
            applied_cents: allocation.applied.cents(),
            unapplied_cents: allocation.unapplied.cents(),
            paid_on: input.paid_on.unwrap_or_else(|| now.date_naive()),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO pendency_payments (
                id, tenant_id, customer_id, method, amount_cents,
                applied_cents, unapplied_cents, paid_on, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.tenant_id)
        .bind(&payment.customer_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.applied_cents)
        .bind(payment.unapplied_cents)
        .bind(payment.paid_on)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        write_allocation(&mut *tx, &payment.id, &allocation, now).await?;

        let mut entry = generated_entry(
            &self.tenant_id,
            EntryKind::Income,
            EntrySource::PendencyPayment,
            amount,
            format!("Pagamento de pendência ({})", payment.method),
            &payment.id,
        );
        entry.occurred_on = payment.paid_on;
        insert_entry(&mut *tx, &entry).await?;

        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            customer_id = %customer_id,
            applied = payment.applied_cents,
            unapplied = payment.unapplied_cents,
            settled = allocation.settled_ids().count(),
            "Pendency payment allocated"
        );

        Ok(PaymentReceipt {
            payment,
            allocation,
        })
    }

    // =========================================================================
    // Balances
    // =========================================================================

    pub async fn balance(&self, customer_id: &str, today: NaiveDate) -> DbResult<CustomerBalance> {
        let customer = self.get(customer_id).await?;
        let open: Vec<OpenPurchase> = self
            .purchases(customer_id, true)
            .await?
            .iter()
            .map(Purchase::to_open)
            .collect();

        let credit: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(unapplied_cents), 0) FROM pendency_payments \
             WHERE tenant_id = ?1 AND customer_id = ?2",
        )
        .bind(&self.tenant_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CustomerBalance {
            customer,
            balance: pendency::summarize(&open, today),
            credit: Money::from_cents(credit),
        })
    }

    /// Balances of every active customer who owes something or holds
    /// credit, largest debt first.
    pub async fn balances(&self, today: NaiveDate) -> DbResult<Vec<CustomerBalance>> {
        let mut balances = Vec::new();
        for customer in self.list().await? {
            let balance = self.balance(&customer.id, today).await?;
            if balance.balance.open_count > 0 || balance.credit.is_positive() {
                balances.push(balance);
            }
        }

        balances.sort_by(|a, b| {
            b.balance
                .outstanding
                .cmp(&a.balance.outstanding)
                .then_with(|| a.customer.name.cmp(&b.customer.name))
        });
        Ok(balances)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repository::test_support::db;
    use crate::Database;

    pub(crate) async fn customer(db: &Database, name: &str) -> Customer {
        db.customers()
            .create(&CustomerInput {
                name: name.to_string(),
                phone: Some(" 11 99999-0000 ".into()),
                email: None,
                notes: Some("   ".into()),
            })
            .await
            .unwrap()
    }

    fn purchase(description: &str, cents: i64) -> PurchaseInput {
        PurchaseInput {
            description: description.to_string(),
            amount_cents: cents,
        }
    }

    fn pay(cents: i64) -> PaymentInput {
        PaymentInput {
            amount_cents: cents,
            method: PaymentMethod::Pix,
            paid_on: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let db = db().await;
        let c = customer(&db, "Dona Maria").await;
        assert_eq!(c.phone.as_deref(), Some("11 99999-0000"));
        assert_eq!(c.notes, None);

        let updated = db
            .customers()
            .update(
                &c.id,
                &CustomerInput {
                    name: "Maria da Silva".into(),
                    phone: None,
                    email: Some("maria@example.com".into()),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Maria da Silva");
        assert_eq!(updated.email.as_deref(), Some("maria@example.com"));
        assert_eq!(db.customers().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_settles_oldest_first() {
        let db = db().await;
        let repo = db.customers();
        let c = customer(&db, "João").await;

        let first = repo.add_purchase(&c.id, &purchase("Arroz", 3000)).await.unwrap();
        let second = repo.add_purchase(&c.id, &purchase("Feijão", 2000)).await.unwrap();

        let receipt = repo.register_payment(&c.id, &pay(4000)).await.unwrap();
        assert_eq!(receipt.payment.applied_cents, 4000);
        assert_eq!(receipt.payment.unapplied_cents, 0);
        assert_eq!(receipt.allocation.lines.len(), 2);
        assert_eq!(receipt.allocation.lines[0].purchase_id, first.id);
        assert!(receipt.allocation.lines[0].settles);

        let open = repo.purchases(&c.id, true).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second.id);
        assert_eq!(open[0].paid_cents, 1000);

        let all = repo.purchases(&c.id, false).await.unwrap();
        assert!(all[0].settled_at.is_some());

        let today = Utc::now().date_naive();
        let ledger = db.ledger().list(today, today).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].source, EntrySource::PendencyPayment);
        assert_eq!(ledger[0].amount_cents, 4000);
    }

    #[tokio::test]
    async fn test_overpayment_becomes_credit() {
        let db = db().await;
        let repo = db.customers();
        let c = customer(&db, "Ana").await;

        repo.add_purchase(&c.id, &purchase("Pão", 1500)).await.unwrap();
        let receipt = repo.register_payment(&c.id, &pay(2000)).await.unwrap();
        assert_eq!(receipt.payment.unapplied_cents, 500);

        let today = Utc::now().date_naive();
        let balance = repo.balance(&c.id, today).await.unwrap();
        assert_eq!(balance.balance.open_count, 0);
        assert_eq!(balance.balance.outstanding, Money::zero());
        assert_eq!(balance.credit.cents(), 500);
        assert_eq!(repo.payments(&c.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_credit_pays_next_purchase() {
        let db = db().await;
        let repo = db.customers();
        let c = customer(&db, "Beatriz").await;
        let today = Utc::now().date_naive();

        repo.add_purchase(&c.id, &purchase("Pão", 1500)).await.unwrap();
        repo.register_payment(&c.id, &pay(2000)).await.unwrap();

        let leite = repo.add_purchase(&c.id, &purchase("Leite", 1000)).await.unwrap();
        assert_eq!(leite.paid_cents, 500);
        assert!(leite.settled_at.is_none());

        let balance = repo.balance(&c.id, today).await.unwrap();
        assert_eq!(balance.balance.outstanding.cents(), 500);
        assert_eq!(balance.credit, Money::zero());

        let payments = repo.payments(&c.id).await.unwrap();
        assert_eq!(payments[0].applied_cents, 2000);
        assert_eq!(payments[0].unapplied_cents, 0);

        let receipt = repo.register_payment(&c.id, &pay(500)).await.unwrap();
        assert_eq!(receipt.payment.unapplied_cents, 0);
        let balance = repo.balance(&c.id, today).await.unwrap();
        assert_eq!(balance.balance.open_count, 0);
        assert_eq!(balance.credit, Money::zero());

        // Cash was counted once, when it came in
        let ledger = db.ledger().list(today, today).await.unwrap();
        let income: i64 = ledger.iter().map(|e| e.amount_cents).sum();
        assert_eq!(income, 2500);
    }

    #[tokio::test]
    async fn test_credit_larger_than_purchase() {
        let db = db().await;
        let repo = db.customers();
        let c = customer(&db, "Caio").await;

        repo.add_purchase(&c.id, &purchase("Café", 1000)).await.unwrap();
        repo.register_payment(&c.id, &pay(1800)).await.unwrap();

        let acucar = repo.add_purchase(&c.id, &purchase("Açúcar", 300)).await.unwrap();
        assert_eq!(acucar.paid_cents, 300);
        assert!(acucar.settled_at.is_some());

        let balance = repo.balance(&c.id, Utc::now().date_naive()).await.unwrap();
        assert_eq!(balance.balance.open_count, 0);
        assert_eq!(balance.credit.cents(), 500);
    }

    #[tokio::test]
    async fn test_balances_keep_credit_only_customers() {
        let db = db().await;
        let repo = db.customers();
        let devedor = customer(&db, "Davi").await;
        let credor = customer(&db, "Elisa").await;
        customer(&db, "Fábio").await;

        repo.add_purchase(&devedor.id, &purchase("Queijo", 700)).await.unwrap();
        repo.add_purchase(&credor.id, &purchase("Pão", 1000)).await.unwrap();
        repo.register_payment(&credor.id, &pay(1200)).await.unwrap();

        let balances = repo.balances(Utc::now().date_naive()).await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].customer.id, devedor.id);
        assert_eq!(balances[1].customer.id, credor.id);
        assert_eq!(balances[1].balance.open_count, 0);
        assert_eq!(balances[1].credit.cents(), 200);
    }

    #[tokio::test]
    async fn test_payment_without_open_purchases() {
        let db = db().await;
        let c = customer(&db, "Pedro").await;

        let err = db.customers().register_payment(&c.id, &pay(100)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NothingOutstanding { .. })
        ));
    }

    #[tokio::test]
    async fn test_payment_rejects_on_account_and_unknown_customer() {
        let db = db().await;
        let repo = db.customers();

        let on_account = PaymentInput {
            method: PaymentMethod::OnAccount,
            ..pay(100)
        };
        assert!(matches!(
            repo.register_payment("x", &on_account).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
        assert!(matches!(
            repo.register_payment("x", &pay(100)).await,
            Err(DbError::Domain(CoreError::CustomerNotFound(_)))
        ));
        assert!(matches!(
            repo.add_purchase("x", &purchase("Leite", 100)).await,
            Err(DbError::Domain(CoreError::CustomerNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_balances_sorted_by_outstanding() {
        let db = db().await;
        let repo = db.customers();
        let small = customer(&db, "Bruno").await;
        let large = customer(&db, "Carla").await;
        customer(&db, "Zé sem conta").await;

        repo.add_purchase(&small.id, &purchase("Café", 800)).await.unwrap();
        repo.add_purchase(&large.id, &purchase("Cesta", 9000)).await.unwrap();

        let balances = repo.balances(Utc::now().date_naive()).await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].customer.id, large.id);
        assert_eq!(balances[0].balance.outstanding.cents(), 9000);
        assert_eq!(balances[0].balance.oldest_open_days, Some(0));
    }
}
