//! # Config Routes
//!
//! Read-only business settings the dashboard needs at startup: store name,
//! currency formatting and the tax mode used for quotes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;

use caixa_billing::PaymentGateway;

use crate::config::{BusinessSettings, ServerConfig};
use crate::state::AppState;

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new().route("/config", get(get_config))
}

async fn get_config(State(config): State<Arc<ServerConfig>>) -> Json<BusinessSettings> {
    debug!("get_config");
    Json(config.business.clone())
}
