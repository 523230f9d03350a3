//! # Subscription Routes
//!
//! Mounted outside the subscription gate: a blocked tenant must still be
//! able to see why and pay.
//!
//! ## Renewal Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Dashboard                 Server                      Gateway          │
//! │  ─────────                 ──────                      ───────          │
//! │                                                                         │
//! │  POST /subscription/checkout ──► create preference ──► init_point       │
//! │       ◄──────────────────────── { preference_id, init_point }           │
//! │                                                                         │
//! │  (payer pays on the hosted page)                                        │
//! │                                                                         │
//! │                            POST /webhooks/billing ◄── x-signature       │
//! │                              verify HMAC                                │
//! │                              GET /v1/payments/{id} ──► approved?        │
//! │                              extend paid_through (once per payment)     │
//! │                                                                         │
//! │  GET /subscription ──► { access: { tone: "active", ... } }              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use caixa_billing::{
    BillingService, CheckoutLink, NotificationOutcome, PaymentGateway, SubscriptionStatus,
};
use caixa_core::subscription::Plan;
use caixa_core::BillingPayment;

use crate::error::ApiError;
use crate::state::{today, AppState};

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route("/subscription", get(status::<G>))
        .route("/subscription/checkout", post(checkout::<G>))
        .route("/subscription/cancel", post(cancel::<G>))
        .route("/subscription/payments", get(payments::<G>))
        .route("/webhooks/billing", post(webhook::<G>))
}

async fn status<G: PaymentGateway>(
    State(billing): State<Arc<BillingService<G>>>,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    Ok(Json(billing.status(today()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    /// Defaults to the current plan.
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub payer_email: Option<String>,
}

async fn checkout<G: PaymentGateway>(
    State(billing): State<Arc<BillingService<G>>>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutLink>, ApiError> {
    let link = billing
        .start_checkout(body.plan, body.payer_email, today())
        .await?;
    Ok(Json(link))
}

/// Cancels at the end of the period already paid for.
async fn cancel<G: PaymentGateway>(
    State(billing): State<Arc<BillingService<G>>>,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    Ok(Json(billing.cancel(today()).await?))
}

async fn payments<G: PaymentGateway>(
    State(billing): State<Arc<BillingService<G>>>,
) -> Result<Json<Vec<BillingPayment>>, ApiError> {
    Ok(Json(billing.payments().await?))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Gateway notification endpoint.
///
/// Replays of an already applied payment answer 200 with
/// `already_applied`, so the gateway stops retrying.
async fn webhook<G: PaymentGateway>(
    State(billing): State<Arc<BillingService<G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotificationOutcome>, ApiError> {
    let signature = header(&headers, "x-signature");
    let request_id = header(&headers, "x-request-id");

    match billing
        .handle_notification(signature, request_id, &body, today())
        .await
    {
        Ok(outcome) => {
            info!(request_id = %request_id, outcome = ?outcome, "Billing notification handled");
            Ok(Json(outcome))
        }
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Billing notification failed");
            Err(e.into())
        }
    }
}
