//! # Report Routes
//!
//! `GET /reports/summary?from=&to=&top=` feeds the dashboard home screen:
//! sales by method, best sellers, cash flow and outstanding pendencies.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use caixa_billing::PaymentGateway;
use caixa_core::report::DashboardReport;
use caixa_db::Database;

use super::{month_start, DateRange};
use crate::error::ApiError;
use crate::state::{today, AppState};

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new().route("/reports/summary", get(summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Best sellers to include (default: 5, max: 50).
    pub top: Option<usize>,
}

async fn summary(
    State(db): State<Database>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DashboardReport>, ApiError> {
    let range = DateRange {
        from: query.from,
        to: query.to,
    };
    let (from, to) = range.resolve(month_start);
    let top_n = query.top.unwrap_or(5).min(50);

    debug!(%from, %to, top_n, "report summary");
    let report = db.reports().dashboard(from, to, today(), top_n).await?;
    Ok(Json(report))
}
