//! # HTTP Routes
//!
//! One module per resource. Each exposes `routes()` returning a router over
//! the shared [`AppState`].
//!
//! ## Route Organization
//! - [`health`] - Liveness and database check
//! - [`config`] - Business settings for the dashboard
//! - [`products`] - Catalog CRUD, stock adjustments, low stock
//! - [`transactions`] - Cash-flow ledger and running balance
//! - [`customers`] - Customers, on-account purchases, pendency payments
//! - [`sales`] - Quote, checkout, void
//! - [`goals`] - Goals and their progress
//! - [`reports`] - Dashboard summary
//! - [`subscription`] - Status, checkout, cancel, gateway webhook
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Router                                                      │
//! │                                                              │
//! │  business routes ──► route_layer(require_active) ──► handler │
//! │  /health, /config, /subscription/*, /webhooks/* ──► handler  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use axum::middleware;
use axum::Router;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use caixa_billing::PaymentGateway;

use crate::gate::require_active;
use crate::state::{today, AppState};

pub mod config;
pub mod customers;
pub mod goals;
pub mod health;
pub mod products;
pub mod reports;
pub mod sales;
pub mod subscription;
pub mod transactions;

/// Builds the full application router.
pub fn router<G: PaymentGateway + 'static>(state: AppState<G>) -> Router {
    let business = Router::new()
        .merge(products::routes::<G>())
        .merge(transactions::routes::<G>())
        .merge(customers::routes::<G>())
        .merge(sales::routes::<G>())
        .merge(goals::routes::<G>())
        .merge(reports::routes::<G>())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_active::<G>,
        ));

    Router::new()
        .merge(health::routes::<G>())
        .merge(config::routes::<G>())
        .merge(subscription::routes::<G>())
        .merge(business)
        .with_state(state)
}

/// `?from=&to=` query, both optional.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Missing `to` is today; missing `from` is `default_from(to)`.
    pub fn resolve(
        self,
        default_from: impl FnOnce(NaiveDate) -> NaiveDate,
    ) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or_else(today);
        let from = self.from.unwrap_or_else(|| default_from(to));
        (from, to)
    }
}

/// First day of the month containing `day`.
pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}
