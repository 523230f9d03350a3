//! # Billing Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Billing Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Configuration  │  │    Gateway      │  │     Notification        │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  InvalidConfig  │  │  Gateway{status}│  │  InvalidSignature       │  │
//! │  │  NotConfigured  │  │  Http           │  │  InvalidNotification    │  │
//! │  │  ConfigLoad     │  │                 │  │  PaymentRejected        │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  Database(DbError) for anything the subscription repository reports.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use caixa_core::ValidationError;
use caixa_db::DbError;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid billing configuration: {0}")]
    InvalidConfig(String),

    /// The gateway access token is not set.
    #[error("Billing is not configured")]
    NotConfigured,

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Gateway Errors
    // =========================================================================
    /// The gateway answered with a non-success status.
    #[error("Gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    /// The request never got a usable answer (connect, timeout, decode).
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Notification Errors
    // =========================================================================
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    /// The payment exists but does not pay for this tenant's subscription.
    #[error("Payment {payment_id} rejected: {reason}")]
    PaymentRejected { payment_id: String, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Storage
    // =========================================================================
    #[error(transparent)]
    Database(#[from] DbError),
}

impl BillingError {
    /// Returns true if repeating the same gateway call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Gateway { status, .. } => *status == 429 || *status >= 500,
            BillingError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for BillingError {
    fn from(err: std::io::Error) -> Self {
        BillingError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for BillingError {
    fn from(err: toml::de::Error) -> Self {
        BillingError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for BillingError {
    fn from(err: toml::ser::Error) -> Self {
        BillingError::ConfigSaveFailed(err.to_string())
    }
}
