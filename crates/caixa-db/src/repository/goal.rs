//! # Goal Repository
//!
//! Goals and the value achieved towards them. The achieved value is always
//! computed from sales and the ledger, never stored.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use caixa_core::goal::{self, GoalProgress};
use caixa_core::validation::{validate_date_range, validate_description, validate_positive_amount};
use caixa_core::{Goal, GoalMetric};

use super::{new_id, timestamp_bounds};
use crate::error::{DbError, DbResult};

const GOAL_COLUMNS: &str =
    "id, tenant_id, title, metric, target_value, starts_on, ends_on, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct GoalInput {
    pub title: String,
    pub metric: GoalMetric,
    /// Cents for money metrics, a count for `sales_count`.
    pub target_value: i64,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct GoalRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl GoalRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        GoalRepository { pool, tenant_id }
    }

    pub async fn insert(&self, input: &GoalInput) -> DbResult<Goal> {
        let title = validate_description(&input.title)?;
        validate_positive_amount("target_value", input.target_value)?;
        validate_date_range("goal", input.starts_on, input.ends_on)?;

        let goal = Goal {
            id: new_id(),
            tenant_id: self.tenant_id.clone(),
            title,
            metric: input.metric,
            target_value: input.target_value,
            starts_on: input.starts_on,
            ends_on: input.ends_on,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO goals (id, tenant_id, title, metric, target_value, starts_on, ends_on, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&goal.id)
        .bind(&goal.tenant_id)
        .bind(&goal.title)
        .bind(goal.metric)
        .bind(goal.target_value)
        .bind(goal.starts_on)
        .bind(goal.ends_on)
        .bind(goal.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %goal.id, metric = ?goal.metric, target = goal.target_value, "Goal created");
        Ok(goal)
    }

    /// Goals ordered by start date, most recent first.
    pub async fn list(&self) -> DbResult<Vec<Goal>> {
        let sql = format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE tenant_id = ?1 ORDER BY starts_on DESC, title"
        );
        let goals = sqlx::query_as::<_, Goal>(&sql)
            .bind(&self.tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(goals)
    }

    pub async fn get(&self, id: &str) -> DbResult<Goal> {
        let sql = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1 AND tenant_id = ?2");
        sqlx::query_as::<_, Goal>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Goal", id))
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(&self.tenant_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Goal", id));
        }
        info!(id = %id, "Goal deleted");
        Ok(())
    }

    /// Value achieved during the goal's date range.
    ///
    /// - `Revenue`: sum of completed sale totals
    /// - `CashNet`: ledger income minus expense
    /// - `SalesCount`: number of completed sales
    pub async fn achieved(&self, goal: &Goal) -> DbResult<i64> {
        debug!(id = %goal.id, metric = ?goal.metric, "Computing goal achievement");
        let (start, end) = timestamp_bounds(goal.starts_on, goal.ends_on);

        let value: i64 = match goal.metric {
            GoalMetric::Revenue => {
                sqlx::query_scalar(
                    "SELECT COALESCE(SUM(total_cents), 0) FROM sales \
                     WHERE tenant_id = ?1 AND status = 'completed' \
                     AND created_at >= ?2 AND created_at < ?3",
                )
                .bind(&self.tenant_id)
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?
            }
            GoalMetric::SalesCount => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM sales \
                     WHERE tenant_id = ?1 AND status = 'completed' \
                     AND created_at >= ?2 AND created_at < ?3",
                )
                .bind(&self.tenant_id)
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?
            }
            GoalMetric::CashNet => {
                sqlx::query_scalar(
                    "SELECT COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents \
                     ELSE -amount_cents END), 0) FROM ledger_entries \
                     WHERE tenant_id = ?1 AND occurred_on >= ?2 AND occurred_on <= ?3",
                )
                .bind(&self.tenant_id)
                .bind(goal.starts_on)
                .bind(goal.ends_on)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(value)
    }

    pub async fn progress(&self, id: &str, today: NaiveDate) -> DbResult<GoalProgress> {
        let goal = self.get(id).await?;
        let achieved = self.achieved(&goal).await?;
        Ok(goal::progress(&goal, achieved, today))
    }
}
