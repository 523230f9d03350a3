//! # Customer Routes
//!
//! Customers who buy on account, their open purchases and the payments that
//! settle them.
//!
//! ## Pendency Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /customers/{id}/payments { amount_cents: 4000, method: "pix" }    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  open purchases, oldest first                                           │
//! │  ┌──────────────┬──────────────┬──────────────┐                         │
//! │  │ 03/01  30,00 │ 03/04  20,00 │ 03/09  15,00 │                         │
//! │  └──────┬───────┴──────┬───────┴──────────────┘                         │
//! │         ▼              ▼                                                │
//! │   30,00 settled   10,00 applied, 10,00 left                             │
//! │                                                                         │
//! │  + income entry in the cash-flow ledger for 40,00                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use caixa_billing::PaymentGateway;
use caixa_core::{Customer, PendencyPayment, Purchase};
use caixa_db::repository::customer::{
    CustomerBalance, CustomerInput, PaymentInput, PaymentReceipt, PurchaseInput,
};
use caixa_db::Database;

use crate::error::ApiError;
use crate::state::{today, AppState};

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/balances", get(balances))
        .route("/customers/{id}", get(get_customer).put(update_customer))
        .route(
            "/customers/{id}/purchases",
            get(list_purchases).post(add_purchase),
        )
        .route(
            "/customers/{id}/payments",
            get(list_payments).post(register_payment),
        )
}

async fn list_customers(State(db): State<Database>) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(db.customers().list().await?))
}

async fn create_customer(
    State(db): State<Database>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = db.customers().create(&input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// The customer with their outstanding balance and credit.
async fn get_customer(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<CustomerBalance>, ApiError> {
    Ok(Json(db.customers().balance(&id, today()).await?))
}

async fn update_customer(
    State(db): State<Database>,
    Path(id): Path<String>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(db.customers().update(&id, &input).await?))
}

/// Every active customer's balance, for the pendencies screen.
async fn balances(State(db): State<Database>) -> Result<Json<Vec<CustomerBalance>>, ApiError> {
    Ok(Json(db.customers().balances(today()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseFilter {
    /// Only purchases with something left to pay.
    #[serde(default)]
    pub open: bool,
}

async fn list_purchases(
    State(db): State<Database>,
    Path(id): Path<String>,
    Query(filter): Query<PurchaseFilter>,
) -> Result<Json<Vec<Purchase>>, ApiError> {
    Ok(Json(db.customers().purchases(&id, filter.open).await?))
}

async fn add_purchase(
    State(db): State<Database>,
    Path(id): Path<String>,
    Json(input): Json<PurchaseInput>,
) -> Result<(StatusCode, Json<Purchase>), ApiError> {
    debug!(customer_id = %id, amount = input.amount_cents, "add_purchase");
    let purchase = db.customers().add_purchase(&id, &input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

async fn list_payments(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PendencyPayment>>, ApiError> {
    Ok(Json(db.customers().payments(&id).await?))
}

/// Allocates a payment to the customer's open purchases, oldest first.
///
/// ## Returns
/// The stored payment and how it was split. Anything beyond the
/// outstanding balance is reported as `allocation.unapplied`.
async fn register_payment(
    State(db): State<Database>,
    Path(id): Path<String>,
    Json(input): Json<PaymentInput>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ApiError> {
    debug!(customer_id = %id, amount = input.amount_cents, method = %input.method, "register_payment");
    let receipt = db.customers().register_payment(&id, &input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{app, TestApp};

    async fn customer(app: &TestApp, name: &str) -> String {
        let (status, body) = app
            .post("/customers", json!({ "name": name, "phone": "11 99999-0000" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_purchases_and_payments() {
        let app = app().await;
        let id = customer(&app, "Dona Maria").await;

        for (description, amount) in [("Feira da semana", 3_000), ("Pão e leite", 2_000)] {
            let (status, _) = app
                .post(
                    &format!("/customers/{}/purchases", id),
                    json!({ "description": description, "amount_cents": amount }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = app
            .post(
                &format!("/customers/{}/payments", id),
                json!({ "amount_cents": 4_000, "method": "pix" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["allocation"]["applied"], 4_000);
        assert_eq!(body["allocation"]["unapplied"], 0);

        let (_, body) = app.get(&format!("/customers/{}", id)).await;
        assert_eq!(body["balance"]["outstanding"], 1_000);
        assert_eq!(body["balance"]["open_count"], 1);

        let (_, body) = app.get(&format!("/customers/{}/purchases?open=true", id)).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        // Overpayment becomes credit
        let (_, body) = app
            .post(
                &format!("/customers/{}/payments", id),
                json!({ "amount_cents": 1_500, "method": "cash" }),
            )
            .await;
        assert_eq!(body["allocation"]["applied"], 1_000);
        assert_eq!(body["allocation"]["unapplied"], 500);

        // A customer holding only credit stays on the pendencies screen
        let (_, body) = app.get("/customers/balances").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["balance"]["outstanding"], 0);
        assert_eq!(body[0]["credit"], 500);

        // The next purchase is paid from that credit first
        let (status, body) = app
            .post(
                &format!("/customers/{}/purchases", id),
                json!({ "description": "Café", "amount_cents": 1_000 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["paid_cents"], 500);

        let (_, body) = app.get(&format!("/customers/{}", id)).await;
        assert_eq!(body["balance"]["outstanding"], 500);
        assert_eq!(body["credit"], 0);

        let (_, body) = app.get(&format!("/customers/{}/payments", id)).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_payment_rules() {
        let app = app().await;
        let id = customer(&app, "Seu João").await;

        let (status, body) = app
            .post(
                &format!("/customers/{}/payments", id),
                json!({ "amount_cents": 1_000, "method": "cash" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUSINESS_LOGIC");

        let (status, _) = app
            .post(
                &format!("/customers/{}/payments", id),
                json!({ "amount_cents": 1_000, "method": "on_account" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(
                "/customers/missing/payments",
                json!({ "amount_cents": 1_000, "method": "cash" }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_customer() {
        let app = app().await;
        let id = customer(&app, "Ana").await;

        let (status, body) = app
            .put(
                &format!("/customers/{}", id),
                json!({ "name": "Ana Paula", "email": "ana@example.com" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ana Paula");
        assert_eq!(body["email"], "ana@example.com");

        let (status, _) = app.post("/customers", json!({ "name": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
