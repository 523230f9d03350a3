//! # API Error Type
//!
//! Unified error type for route handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Caixa                                  │
//! │                                                                         │
//! │  Dashboard                   Rust Backend                               │
//! │  ─────────                   ────────────                               │
//! │                                                                         │
//! │  POST /sales                                                            │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │  Handler                                                         │   │
//! │  │  Result<Json<T>, ApiError>                                       │   │
//! │  │         │                                                        │   │
//! │  │         ▼                                                        │   │
//! │  │  DbError / CoreError / BillingError ──► ApiError { code, msg }   │   │
//! │  │                                              │                   │   │
//! │  │                                              ▼                   │   │
//! │  │                                   IntoResponse: status + JSON    │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  HTTP 422                                                               │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for CAFE-500: 2 available, 5 ..." }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal failures are logged with detail and returned with a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use caixa_billing::BillingError;
use caixa_core::{CoreError, ValidationError};
use caixa_db::DbError;

/// Body of every error response.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Product not found: 5f0c..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 404
    NotFound,
    /// 400
    ValidationError,
    /// 409
    Conflict,
    /// 500
    DatabaseError,
    /// 422
    BusinessLogic,
    /// 500
    Internal,
    /// 422
    CartError,
    /// 422
    InsufficientStock,
    /// 422
    PaymentError,
    /// 402
    SubscriptionBlocked,
    /// 401, webhook signature did not verify
    Unauthorized,
    /// 502
    GatewayError,
    /// 503
    BillingUnavailable,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::BusinessLogic
            | ErrorCode::CartError
            | ErrorCode::InsufficientStock
            | ErrorCode::PaymentError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::SubscriptionBlocked => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
            ErrorCode::BillingUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::CheckViolation(message) => {
                tracing::error!("Check constraint violation: {}", message);
                ApiError::validation("Value rejected by the database")
            }
            DbError::Domain(e) => e.into(),
            DbError::Busy(e) => {
                tracing::error!("Database busy after retries: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            CoreError::CustomerNotFound(id) => ApiError::not_found("Customer", &id),
            CoreError::LineNotFound(_) => ApiError::new(ErrorCode::NotFound, message),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, message)
            }
            CoreError::CartTooLarge { .. } | CoreError::EmptyCart => {
                ApiError::new(ErrorCode::CartError, message)
            }
            CoreError::QuantityTooLarge { .. } => ApiError::validation(message),
            CoreError::InvalidPaymentAmount { .. } | CoreError::InsufficientPayment { .. } => {
                ApiError::new(ErrorCode::PaymentError, message)
            }
            CoreError::InvalidSaleStatus { .. }
            | CoreError::CustomerRequired
            | CoreError::NothingOutstanding { .. }
            | CoreError::LedgerEntryLocked { .. }
            | CoreError::SaleHasPayments { .. } => ApiError::new(ErrorCode::BusinessLogic, message),
            CoreError::SubscriptionBlocked { .. } => {
                ApiError::new(ErrorCode::SubscriptionBlocked, message)
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotConfigured => {
                ApiError::new(ErrorCode::BillingUnavailable, "Billing is not configured")
            }
            BillingError::InvalidSignature(_) => {
                ApiError::new(ErrorCode::Unauthorized, err.to_string())
            }
            BillingError::InvalidNotification(_) | BillingError::PaymentRejected { .. } => {
                ApiError::validation(err.to_string())
            }
            BillingError::Validation(e) => e.into(),
            BillingError::Gateway { status, message } => {
                tracing::error!(status, "Gateway error: {}", message);
                ApiError::new(ErrorCode::GatewayError, "Payment gateway rejected the request")
            }
            BillingError::Http(e) => {
                tracing::error!("Gateway unreachable: {}", e);
                ApiError::new(ErrorCode::GatewayError, "Payment gateway unavailable")
            }
            BillingError::Database(e) => e.into(),
            BillingError::InvalidConfig(_)
            | BillingError::ConfigLoadFailed(_)
            | BillingError::ConfigSaveFailed(_) => {
                tracing::error!("Billing configuration error: {}", err);
                ApiError::internal("Billing is misconfigured")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
