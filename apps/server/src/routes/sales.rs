//! # Sale Routes
//!
//! The POS cart lives on the client. The server prices it on demand and
//! records it at checkout.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POS Screen                                                             │
//! │                                                                         │
//! │  cart changes ──► POST /sales/quote   (pure, no writes, never gated)    │
//! │                         │                                               │
//! │                         ▼                                               │
//! │                   lines + totals                                        │
//! │                                                                         │
//! │  "Finalizar" ──► POST /sales { cart, payment_method, received_cents }   │
//! │                         │                                               │
//! │                         ▼                                               │
//! │        reprice from catalog ─► stock check ─► sale + items              │
//! │        ─► stock moves ─► ledger entry or customer pendency              │
//! │                         │                                               │
//! │                         ▼                                               │
//! │                   201 { sale, items, tender }                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use caixa_billing::PaymentGateway;
use caixa_core::cart::{self, Cart, Quote};
use caixa_core::Sale;
use caixa_db::repository::sale::{CheckoutInput, SaleDetail, SaleReceipt};
use caixa_db::Database;

use super::DateRange;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route("/sales", get(list_sales).post(checkout))
        .route("/sales/quote", post(quote))
        .route("/sales/{id}", get(get_sale))
        .route("/sales/{id}/void", post(void_sale))
}

/// Prices a cart with the configured tax mode.
async fn quote(
    State(config): State<Arc<ServerConfig>>,
    Json(cart): Json<Cart>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(cart::quote(&cart, config.business.tax_mode)?))
}

async fn checkout(
    State(db): State<Database>,
    State(config): State<Arc<ServerConfig>>,
    Json(input): Json<CheckoutInput>,
) -> Result<(StatusCode, Json<SaleReceipt>), ApiError> {
    let start = Instant::now();
    let receipt = db
        .sales()
        .record_sale(&input, config.business.tax_mode)
        .await?;

    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        receipt = %receipt.sale.receipt_number,
        total = %config.format_currency(receipt.sale.total_cents),
        "checkout complete"
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Sales created in `[from, to]`, both defaulting to today.
async fn list_sales(
    State(db): State<Database>,
    Query(range): Query<DateRange>,
) -> Result<Json<Vec<Sale>>, ApiError> {
    let (from, to) = range.resolve(|to| to);
    Ok(Json(db.sales().list(from, to).await?))
}

async fn get_sale(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<SaleDetail>, ApiError> {
    Ok(Json(db.sales().get(&id).await?))
}

/// Voids a sale, returning stock and reversing its cash-flow entry.
async fn void_sale(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<Sale>, ApiError> {
    let sale = db.sales().void_sale(&id).await?;
    info!(id = %sale.id, receipt = %sale.receipt_number, "Sale voided");
    Ok(Json(sale))
}
