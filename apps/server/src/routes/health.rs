//! Liveness check for load balancers and the dashboard's connection badge.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use caixa_billing::PaymentGateway;
use caixa_db::Database;

use crate::state::AppState;

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
    pub server_time: DateTime<Utc>,
}

/// 200 when the database answers, 503 otherwise.
async fn health(State(db): State<Database>) -> (StatusCode, Json<HealthResponse>) {
    let database = db.health_check().await;
    let (code, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
            server_time: Utc::now(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::app;

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }
}
