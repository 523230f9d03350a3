//! # Ledger Repository
//!
//! Cash-flow transactions. Manual entries are written here directly; sales
//! and customer payments write theirs through [`insert_entry`] inside their
//! own SQL transaction.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use caixa_core::validation::{validate_date_range, validate_description, validate_positive_amount};
use caixa_core::{CoreError, EntryKind, EntrySource, LedgerEntry, Money};

use super::new_id;
use crate::error::{DbError, DbResult};

pub(crate) const LEDGER_COLUMNS: &str = "id, tenant_id, kind, source, amount_cents, category, \
     description, occurred_on, reference_id, created_at";

/// A manual cash-flow entry as sent by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub amount_cents: i64,
    #[serde(default)]
    pub category: Option<String>,
    pub description: String,
    pub occurred_on: NaiveDate,
}

/// Inserts `entry` on an open connection or transaction.
pub(crate) async fn insert_entry(conn: &mut SqliteConnection, entry: &LedgerEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, tenant_id, kind, source, amount_cents, category,
            description, occurred_on, reference_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.tenant_id)
    .bind(entry.kind)
    .bind(entry.source)
    .bind(entry.amount_cents)
    .bind(&entry.category)
    .bind(&entry.description)
    .bind(entry.occurred_on)
    .bind(&entry.reference_id)
    .bind(entry.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Builds a generated (non-manual) entry. `amount` must be positive.
pub(crate) fn generated_entry(
    tenant_id: &str,
    kind: EntryKind,
    source: EntrySource,
    amount: Money,
    description: String,
    reference_id: &str,
) -> LedgerEntry {
    let now = Utc::now();
    LedgerEntry {
        id: new_id(),
        tenant_id: tenant_id.to_string(),
        kind,
        source,
        amount_cents: amount.cents(),
        category: None,
        description,
        occurred_on: now.date_naive(),
        reference_id: Some(reference_id.to_string()),
        created_at: now,
    }
}

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        LedgerRepository { pool, tenant_id }
    }

    /// Records a manual income or expense.
    pub async fn insert(&self, input: &NewEntry) -> DbResult<LedgerEntry> {
        validate_positive_amount("amount_cents", input.amount_cents)?;
        let description = validate_description(&input.description)?;

        let entry = LedgerEntry {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            kind: input.kind,
            source: EntrySource::Manual,
            amount_cents: input.amount_cents,
            category: input
                .category
                .as_ref()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            description,
            occurred_on: input.occurred_on,
            reference_id: None,
            created_at: Utc::now(),
        };

        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, &entry).await?;

        info!(id = %entry.id, kind = ?entry.kind, amount = entry.amount_cents, "Ledger entry recorded");
        Ok(entry)
    }

    pub async fn get(&self, id: &str) -> DbResult<LedgerEntry> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE id = ?1 AND tenant_id = ?2"
        );
        sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("LedgerEntry", id))
    }

    /// Entries with `occurred_on` in `[from, to]`, in balance order.
    pub async fn list(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<LedgerEntry>> {
        validate_date_range("occurred_on", from, to)?;
        debug!(%from, %to, "Listing ledger entries");

        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries \
             WHERE tenant_id = ?1 AND occurred_on >= ?2 AND occurred_on <= ?3 \
             ORDER BY occurred_on, created_at, id"
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(&self.tenant_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Deletes a manual entry.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(CoreError::LedgerEntryLocked))` - the entry was
    ///   generated by a sale or a customer payment
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let entry = self.get(id).await?;
        if entry.source != EntrySource::Manual {
            return Err(CoreError::LedgerEntryLocked {
                id: id.to_string(),
                origin: entry.source.to_string(),
            }
            .into());
        }

        sqlx::query("DELETE FROM ledger_entries WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(&self.tenant_id)
            .execute(&self.pool)
            .await?;

        info!(id = %id, "Ledger entry deleted");
        Ok(())
    }

    /// Net of every entry dated strictly before `before`.
    pub async fn opening_balance(&self, before: NaiveDate) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents ELSE -amount_cents END), 0)
            FROM ledger_entries
            WHERE tenant_id = ?1 AND occurred_on < ?2
            "#,
        )
        .bind(&self.tenant_id)
        .bind(before)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }
}
