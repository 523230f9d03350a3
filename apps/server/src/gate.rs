//! # Subscription Gate
//!
//! Middleware on the business routes. Reads always pass. Writes pass
//! while the subscription can write (trial, active or past-due).
//!
//! ```text
//! request ──► GET / HEAD / OPTIONS ───────────────────────────► handler
//!         ──► POST /sales/quote (computes, stores nothing) ───► handler
//!         ──► any other write ──► billing.status(today)
//!                                   ├── can_write ────────────► handler
//!                                   └── blocked ──► 402 SUBSCRIPTION_BLOCKED
//! ```
//!
//! The billing routes are mounted outside this layer so a blocked tenant
//! can still pay.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use caixa_billing::{BillingService, PaymentGateway};
use caixa_core::CoreError;

use crate::error::ApiError;
use crate::state::today;

fn is_read_only(request: &Request) -> bool {
    matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS)
        || (request.method() == Method::POST && request.uri().path() == "/sales/quote")
}

pub async fn require_active<G: PaymentGateway>(
    State(billing): State<Arc<BillingService<G>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_read_only(&request) {
        return Ok(next.run(request).await);
    }

    let status = billing.status(today()).await?;
    if !status.access.can_write {
        debug!(path = %request.uri().path(), "Write rejected, subscription blocked");
        return Err(CoreError::SubscriptionBlocked {
            reason: match status.subscription.canceled_on {
                Some(_) => "subscription was canceled".into(),
                None => "payment overdue past the grace period".into(),
            },
        }
        .into());
    }

    Ok(next.run(request).await)
}
