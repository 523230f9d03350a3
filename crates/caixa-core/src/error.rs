//! # Error Types
//!
//! Domain-specific error types for caixa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caixa-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caixa-db errors       └── DbError       - Database failures           │
//! │  caixa-billing errors  └── BillingError  - Gateway / webhook failures  │
//! │  server errors         └── ApiError      - What the client sees        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete sale.
    ///
    /// Only raised for products with `track_inventory` and without
    /// `allow_negative_stock`.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Line not in cart: {0}")]
    LineNotFound(String),

    #[error("Cart is empty")]
    EmptyCart,

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Cash received does not cover the sale total.
    ///
    /// ## User Workflow
    /// ```text
    /// Total: R$ 25,00
    ///      │
    ///      ▼
    /// Received: R$ 20,00
    ///      │
    ///      ▼
    /// InsufficientPayment { total: 2500, received: 2000 }
    ///      │
    ///      ▼
    /// UI shows: "Faltam R$ 5,00"
    /// ```
    #[error("Payment of {received} cents does not cover total of {total} cents")]
    InsufficientPayment { total: i64, received: i64 },

    /// An on-account sale was attempted without a customer.
    #[error("On-account sales require a customer")]
    CustomerRequired,

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Customer {customer_id} has no open purchases")]
    NothingOutstanding { customer_id: String },

    /// Only manual ledger entries can be deleted; the rest belong to a sale
    /// or a customer payment.
    #[error("Ledger entry {id} comes from {origin} and cannot be deleted")]
    LedgerEntryLocked { id: String, origin: String },

    #[error("Sale {sale_id} has on-account payments and cannot be voided")]
    SaleHasPayments { sale_id: String },

    #[error("Subscription is blocked: {reason}")]
    SubscriptionBlocked { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A date range whose start is after its end.
    #[error("{field}: start {from} is after end {to}")]
    InvalidRange {
        field: String,
        from: String,
        to: String,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
