//! # Transaction Routes
//!
//! The cash-flow ledger: manual entries plus the ones sales and pendency
//! payments generate.
//!
//! ```text
//! GET    /transactions?from=&to=           entries, default month to date
//! POST   /transactions                     manual income or expense
//! DELETE /transactions/{id}                manual entries only
//! GET    /transactions/balance?from=&to=   opening, running, daily, closing
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use caixa_billing::PaymentGateway;
use caixa_core::ledger::{
    daily_totals, running_balance, summarize, BalancePoint, CashFlowSummary, DailyTotal,
};
use caixa_core::{LedgerEntry, Money};
use caixa_db::repository::ledger::NewEntry;
use caixa_db::Database;

use super::{month_start, DateRange};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/balance", get(balance))
        .route("/transactions/{id}", delete(delete_transaction))
}

async fn list_transactions(
    State(db): State<Database>,
    Query(range): Query<DateRange>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let (from, to) = range.resolve(month_start);
    debug!(%from, %to, "list_transactions");
    Ok(Json(db.ledger().list(from, to).await?))
}

async fn create_transaction(
    State(db): State<Database>,
    Json(input): Json<NewEntry>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    let entry = db.ledger().insert(&input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_transaction(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    db.ledger().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Balance view for a date range.
#[derive(Debug, Serialize)]
pub struct BalanceReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Net of everything before `from`.
    pub opening: Money,
    pub closing: Money,
    pub summary: CashFlowSummary,
    pub running: Vec<BalancePoint>,
    pub daily: Vec<DailyTotal>,
}

async fn balance(
    State(db): State<Database>,
    Query(range): Query<DateRange>,
) -> Result<Json<BalanceReport>, ApiError> {
    let (from, to) = range.resolve(month_start);
    let ledger = db.ledger();

    let entries = ledger.list(from, to).await?;
    let opening = ledger.opening_balance(from).await?;
    let summary = summarize(&entries);

    Ok(Json(BalanceReport {
        from,
        to,
        opening,
        closing: opening + summary.net,
        summary,
        running: running_balance(opening, &entries),
        daily: daily_totals(&entries),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::app;

    #[tokio::test]
    async fn test_manual_entries_and_balance() {
        let app = app().await;

        for (kind, amount, day) in [
            ("income", 50_000, "2025-02-27"),
            ("income", 12_000, "2025-03-03"),
            ("expense", 4_500, "2025-03-05"),
        ] {
            let (status, body) = app
                .post(
                    "/transactions",
                    json!({
                        "kind": kind,
                        "amount_cents": amount,
                        "description": "lançamento",
                        "occurred_on": day,
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
        }

        let (status, body) = app
            .get("/transactions/balance?from=2025-03-01&to=2025-03-31")
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["opening"], 50_000);
        assert_eq!(body["summary"]["income"], 12_000);
        assert_eq!(body["summary"]["expense"], 4_500);
        assert_eq!(body["closing"], 57_500);
        assert_eq!(body["running"][1]["balance"], 57_500);
        assert_eq!(body["daily"].as_array().unwrap().len(), 2);

        let (_, body) = app
            .get("/transactions?from=2025-03-01&to=2025-03-31")
            .await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_invalid_entries() {
        let app = app().await;

        let (status, _) = app
            .post(
                "/transactions",
                json!({
                    "kind": "expense",
                    "amount_cents": 0,
                    "description": "nada",
                    "occurred_on": "2025-03-01",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .get("/transactions?from=2025-03-31&to=2025-03-01")
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_manual_entry() {
        let app = app().await;
        let (_, body) = app
            .post(
                "/transactions",
                json!({
                    "kind": "expense",
                    "amount_cents": 1_000,
                    "description": "engano",
                    "occurred_on": "2025-03-01",
                }),
            )
            .await;
        let id = body["id"].as_str().unwrap();

        let (status, _) = app.delete(&format!("/transactions/{}", id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.delete(&format!("/transactions/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
