//! # Report Repository
//!
//! Loads the rows a report needs and hands them to `caixa_core::report`.
//! No aggregation happens in SQL beyond the date filter.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use caixa_core::ledger;
use caixa_core::pendency::{self, OpenPurchase};
use caixa_core::report::{self, DashboardReport};
use caixa_core::validation::validate_date_range;
use caixa_core::{LedgerEntry, Purchase, Sale, SaleItem};

use super::customer::PURCHASE_COLUMNS;
use super::ledger::LEDGER_COLUMNS;
use super::sale::{SALE_COLUMNS, SALE_ITEM_COLUMNS};
use super::timestamp_bounds;
use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        ReportRepository { pool, tenant_id }
    }

    /// Sales, cash flow and outstanding pendencies for `[from, to]`.
    ///
    /// Pendencies are a snapshot as of `today`, not limited to the range.
    pub async fn dashboard(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
        top_n: usize,
    ) -> DbResult<DashboardReport> {
        validate_date_range("report", from, to)?;
        debug!(%from, %to, "Building dashboard report");
        let (start, end) = timestamp_bounds(from, to);

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(&self.tenant_id)
            .bind(&start)
            .bind(&end)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id IN ( \
             SELECT id FROM sales WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3)"
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(&self.tenant_id)
            .bind(&start)
            .bind(&end)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries \
             WHERE tenant_id = ?1 AND occurred_on >= ?2 AND occurred_on <= ?3"
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(&self.tenant_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases \
             WHERE tenant_id = ?1 AND paid_cents < amount_cents"
        );
        let open: Vec<OpenPurchase> = sqlx::query_as::<_, Purchase>(&sql)
            .bind(&self.tenant_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(Purchase::to_open)
            .collect();

        Ok(DashboardReport {
            from,
            to,
            sales: report::sales_summary(&sales, &items, top_n),
            cash_flow: ledger::summarize(&entries),
            pendencies: pendency::summarize(&open, today),
        })
    }
}
