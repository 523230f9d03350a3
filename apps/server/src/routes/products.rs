//! # Product Routes
//!
//! Catalog CRUD for the dashboard and the POS product picker.
//!
//! ```text
//! GET    /products?q=&limit=     search (empty q lists by name)
//! POST   /products               create
//! GET    /products/low-stock     at or below min_stock
//! GET    /products/{id}          one product, deactivated ones too
//! PUT    /products/{id}          replace fields, stock is left as is
//! DELETE /products/{id}          soft delete
//! POST   /products/{id}/stock    { "delta": -2 }
//! ```

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

use caixa_billing::PaymentGateway;
use caixa_core::Product;
use caixa_db::repository::product::ProductInput;
use caixa_db::Database;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route("/products", get(search_products).post(create_product))
        .route("/products/low-stock", get(low_stock))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/stock", post(adjust_stock))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

/// Searches by SKU, name or barcode.
///
/// ## Arguments
/// * `q` - Search term, may be empty
/// * `limit` - Maximum results (default: 20, max: 100)
async fn search_products(
    State(db): State<Database>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let start = Instant::now();
    let limit = query.limit.unwrap_or(20).min(100);

    let products = db.products().search(&query.q, limit).await?;

    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        count = products.len(),
        query = %query.q,
        "search_products complete"
    );
    Ok(Json(products))
}

async fn create_product(
    State(db): State<Database>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    debug!(sku = %input.sku, "create_product");
    let product = db.products().insert(&input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;
    Ok(Json(product))
}

async fn update_product(
    State(db): State<Database>,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    debug!(id = %id, "update_product");
    Ok(Json(db.products().update(&id, &input).await?))
}

async fn delete_product(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    db.products().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Positive restock, negative shrinkage.
    pub delta: i64,
}

async fn adjust_stock(
    State(db): State<Database>,
    Path(id): Path<String>,
    Json(body): Json<StockAdjustment>,
) -> Result<Json<Product>, ApiError> {
    if body.delta == 0 {
        return Err(ApiError::validation("delta must not be zero"));
    }
    Ok(Json(db.products().adjust_stock(&id, body.delta).await?))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

async fn low_stock(
    State(db): State<Database>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(200);
    Ok(Json(db.products().low_stock(limit).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::app;

    #[tokio::test]
    async fn test_product_crud() {
        let app = app().await;
        let id = app.product("CAFE-500", 1890, 10).await;

        let (status, body) = app.get(&format!("/products/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sku"], "CAFE-500");
        assert_eq!(body["price_cents"], 1890);

        let (status, body) = app
            .put(
                &format!("/products/{}", id),
                json!({ "sku": "CAFE-500", "name": "Café 500g", "price_cents": 1990 }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Café 500g");

        let (status, body) = app.get("/products?q=caf").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app.delete(&format!("/products/{}", id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = app.get("/products").await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let app = app().await;
        app.product("ARROZ-5KG", 2590, 3).await;

        let (status, body) = app
            .post(
                "/products",
                json!({ "sku": "ARROZ-5KG", "name": "Outro", "price_cents": 100 }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_stock_adjustment_and_low_stock() {
        let app = app().await;
        let (status, body) = app
            .post(
                "/products",
                json!({
                    "sku": "LEITE-1L",
                    "name": "Leite 1L",
                    "price_cents": 549,
                    "current_stock": 8,
                    "min_stock": 5,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .post(&format!("/products/{}/stock", id), json!({ "delta": -4 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_stock"], 4);

        let (_, body) = app.get("/products/low-stock").await;
        assert_eq!(body[0]["id"], id.as_str());

        let (status, _) = app
            .post(&format!("/products/{}/stock", id), json!({ "delta": 0 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_product_is_404() {
        let app = app().await;
        let (status, body) = app.get("/products/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
