//! # Subscription Repository
//!
//! The tenant's subscription row and the gateway payments applied to it.
//!
//! ## Idempotent Payments
//! ```text
//! webhook (payment 123) ──► apply_gateway_payment ──► INSERT billing_payments
//!                                                      │ new row → extend paid_through
//! webhook (payment 123) ──► apply_gateway_payment ──► ON CONFLICT DO NOTHING
//!   (replay)                                           │ 0 rows → Ok(None), nothing changes
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use caixa_core::subscription::{apply_payment, Plan, SubscriptionTerms};
use caixa_core::{BillingPayment, SubscriptionRecord};

use super::new_id;
use crate::error::{DbError, DbResult};
use crate::retry::{with_retry, RetryPolicy};

const SUBSCRIPTION_COLUMNS: &str =
    "tenant_id, plan, anchor_day, started_on, trial_ends_on, paid_through, canceled_on, updated_at";

const BILLING_PAYMENT_COLUMNS: &str =
    "id, tenant_id, gateway_payment_id, plan, amount_cents, paid_on, paid_through, created_at";

/// An approved payment reported by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayPaymentRecord {
    pub gateway_payment_id: String,
    /// Plan that was paid for. Becomes the subscription's plan.
    pub plan: Plan,
    pub amount_cents: i64,
    pub paid_on: NaiveDate,
}

async fn load(conn: &mut SqliteConnection, tenant_id: &str) -> DbResult<Option<SubscriptionRecord>> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE tenant_id = ?1");
    let record = sqlx::query_as::<_, SubscriptionRecord>(&sql)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

async fn store(conn: &mut SqliteConnection, record: &SubscriptionRecord) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET
            plan = ?2,
            anchor_day = ?3,
            trial_ends_on = ?4,
            paid_through = ?5,
            canceled_on = ?6,
            updated_at = ?7
        WHERE tenant_id = ?1
        "#,
    )
    .bind(&record.tenant_id)
    .bind(record.plan)
    .bind(record.anchor_day)
    .bind(record.trial_ends_on)
    .bind(record.paid_through)
    .bind(record.canceled_on)
    .bind(record.updated_at)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Subscription", &record.tenant_id));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: SqlitePool,
    tenant_id: String,
    retry: RetryPolicy,
}

impl SubscriptionRepository {
    pub fn new(pool: SqlitePool, tenant_id: String, retry: RetryPolicy) -> Self {
        SubscriptionRepository {
            pool,
            tenant_id,
            retry,
        }
    }

    pub async fn get(&self) -> DbResult<Option<SubscriptionRecord>> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, &self.tenant_id).await
    }

    /// Returns the subscription, starting a trial on `today` the first time.
    pub async fn get_or_start(
        &self,
        plan: Plan,
        trial_days: i64,
        today: NaiveDate,
    ) -> DbResult<SubscriptionRecord> {
        let mut conn = self.pool.acquire().await?;
        if let Some(record) = load(&mut conn, &self.tenant_id).await? {
            return Ok(record);
        }

        let terms = SubscriptionTerms::start_trial(plan, today, trial_days);
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                tenant_id, plan, anchor_day, started_on, trial_ends_on,
                paid_through, canceled_on, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6)
            ON CONFLICT (tenant_id) DO NOTHING
            "#,
        )
        .bind(&self.tenant_id)
        .bind(terms.plan)
        .bind(terms.anchor_day)
        .bind(today)
        .bind(terms.trial_ends_on)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        info!(tenant_id = %self.tenant_id, trial_ends_on = %terms.trial_ends_on, "Trial started");

        load(&mut conn, &self.tenant_id)
            .await?
            .ok_or_else(|| DbError::not_found("Subscription", &self.tenant_id))
    }

    /// Writes `terms` back to the row.
    pub async fn save(&self, terms: &SubscriptionTerms) -> DbResult<SubscriptionRecord> {
        let mut conn = self.pool.acquire().await?;
        let mut record = load(&mut conn, &self.tenant_id)
            .await?
            .ok_or_else(|| DbError::not_found("Subscription", &self.tenant_id))?;

        record.apply_terms(terms);
        record.updated_at = Utc::now();
        store(&mut conn, &record).await?;

        debug!(tenant_id = %self.tenant_id, "Subscription saved");
        Ok(record)
    }

    /// Applies an approved gateway payment.
    ///
    /// ## Returns
    /// * `Ok(Some(record))` - payment recorded, coverage extended
    /// * `Ok(None)` - this gateway payment was already applied
    pub async fn apply_gateway_payment(
        &self,
        payment: &GatewayPaymentRecord,
    ) -> DbResult<Option<SubscriptionRecord>> {
        with_retry(&self.retry, "apply_gateway_payment", || self.apply_once(payment)).await
    }

    async fn apply_once(
        &self,
        payment: &GatewayPaymentRecord,
    ) -> DbResult<Option<SubscriptionRecord>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut record = load(&mut *tx, &self.tenant_id)
            .await?
            .ok_or_else(|| DbError::not_found("Subscription", &self.tenant_id))?;

        let mut current = record.terms();
        current.plan = payment.plan;
        let terms = apply_payment(&current, payment.paid_on);
        let paid_through = terms.paid_through.unwrap_or(payment.paid_on);

        let inserted = sqlx::query(
            r#"
            INSERT INTO billing_payments (
                id, tenant_id, gateway_payment_id, plan, amount_cents,
                paid_on, paid_through, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (gateway_payment_id) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(&self.tenant_id)
        .bind(&payment.gateway_payment_id)
        .bind(payment.plan)
        .bind(payment.amount_cents)
        .bind(payment.paid_on)
        .bind(paid_through)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            debug!(gateway_payment_id = %payment.gateway_payment_id, "Payment already applied");
            return Ok(None);
        }

        record.apply_terms(&terms);
        record.updated_at = now;
        store(&mut *tx, &record).await?;
        tx.commit().await?;

        info!(
            gateway_payment_id = %payment.gateway_payment_id,
            paid_through = %paid_through,
            "Subscription renewed"
        );
        Ok(Some(record))
    }

    /// Applied gateway payments, newest first.
    pub async fn list_payments(&self) -> DbResult<Vec<BillingPayment>> {
        let sql = format!(
            "SELECT {BILLING_PAYMENT_COLUMNS} FROM billing_payments \
             WHERE tenant_id = ?1 ORDER BY paid_on DESC, created_at DESC"
        );
        let payments = sqlx::query_as::<_, BillingPayment>(&sql)
            .bind(&self.tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn payment(id: &str, paid_on: NaiveDate) -> GatewayPaymentRecord {
        GatewayPaymentRecord {
            gateway_payment_id: id.to_string(),
            plan: Plan::Monthly,
            amount_cents: 4990,
            paid_on,
        }
    }

    #[tokio::test]
    async fn test_get_or_start_is_stable() {
        let db = db().await;
        let repo = db.subscriptions();
        assert!(repo.get().await.unwrap().is_none());

        let first = repo.get_or_start(Plan::Monthly, 14, date(2026, 3, 10)).await.unwrap();
        assert_eq!(first.trial_ends_on, date(2026, 3, 24));
        assert_eq!(first.anchor_day, 10);
        assert!(first.paid_through.is_none());

        let again = repo.get_or_start(Plan::Annual, 30, date(2026, 5, 1)).await.unwrap();
        assert_eq!(again.plan, Plan::Monthly);
        assert_eq!(again.started_on, date(2026, 3, 10));
    }

    #[tokio::test]
    async fn test_payment_applied_once() {
        let db = db().await;
        let repo = db.subscriptions();
        repo.get_or_start(Plan::Monthly, 14, date(2026, 3, 10)).await.unwrap();

        let renewed = repo
            .apply_gateway_payment(&payment("mp-1", date(2026, 3, 20)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renewed.paid_through, Some(date(2026, 4, 20)));
        assert_eq!(renewed.anchor_day, 20);

        let replay = repo
            .apply_gateway_payment(&payment("mp-1", date(2026, 3, 20)))
            .await
            .unwrap();
        assert!(replay.is_none());

        let stored = repo.get().await.unwrap().unwrap();
        assert_eq!(stored.paid_through, Some(date(2026, 4, 20)));

        let payments = repo.list_payments().await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].paid_through, date(2026, 4, 20));
    }

    #[tokio::test]
    async fn test_payment_switches_plan() {
        let db = db().await;
        let repo = db.subscriptions();
        repo.get_or_start(Plan::Monthly, 14, date(2026, 3, 10)).await.unwrap();

        let mut annual = payment("mp-2", date(2026, 3, 12));
        annual.plan = Plan::Annual;
        annual.amount_cents = 49_900;
        let renewed = repo.apply_gateway_payment(&annual).await.unwrap().unwrap();
        assert_eq!(renewed.plan, Plan::Annual);
        assert_eq!(renewed.paid_through, Some(date(2027, 3, 12)));
    }

    #[tokio::test]
    async fn test_save_cancellation() {
        let db = db().await;
        let repo = db.subscriptions();
        let record = repo.get_or_start(Plan::Quarterly, 7, date(2026, 1, 5)).await.unwrap();

        let mut terms = record.terms();
        terms.cancel(date(2026, 1, 8));
        let saved = repo.save(&terms).await.unwrap();
        assert_eq!(saved.canceled_on, Some(date(2026, 1, 8)));
    }

    #[tokio::test]
    async fn test_payment_without_subscription() {
        let db = db().await;
        let err = db
            .subscriptions()
            .apply_gateway_payment(&payment("mp-9", date(2026, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
