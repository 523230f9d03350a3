//! # Validation Module
//!
//! Input validation for everything that reaches the business rules.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP handler                                                  │
//! │  └── Deserialization (serde) rejects wrong shapes                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  └── Lengths, ranges, formats, date ranges                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  └── NOT NULL, UNIQUE (tenant_id, sku), FOREIGN KEY, CHECK              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::validation::{validate_sku, validate_cart_quantity};
//!
//! assert!(validate_sku("CAFE-500").is_ok());
//! // Negative quantities are returns
//! assert!(validate_cart_quantity(-2).is_ok());
//! assert!(validate_cart_quantity(0).is_err());
//! ```

use chrono::NaiveDate;

use crate::cart::Discount;
use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_SKU_LEN: usize = 50;
const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_QUERY_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Trims `value` and checks it is present and at most `max` characters.
fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a SKU: 1-50 characters of letters, digits, `-` or `_`.
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_sku;
///
/// assert!(validate_sku("CAFE-500").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<String> {
    let sku = required_text("sku", sku, MAX_SKU_LEN)?;

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid_format(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(sku)
}

pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    required_text("name", name, MAX_NAME_LEN)
}

pub fn validate_customer_name(name: &str) -> ValidationResult<String> {
    required_text("customer name", name, MAX_NAME_LEN)
}

/// Validates a free-text description (ledger entries, purchases, goals).
pub fn validate_description(text: &str) -> ValidationResult<String> {
    required_text("description", text, MAX_DESCRIPTION_LEN)
}

/// Validates a search query. Empty is allowed and means "everything".
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_QUERY_LEN,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a signed cart quantity.
///
/// ## User Workflow
/// ```text
/// Operator types quantity
///      │
///      ├── 0?            → Error: quantity must be positive
///      ├── |qty| > 999?  → Error: quantity must be between -999 and 999
///      │
///      ├── qty > 0       → sale line
///      └── qty < 0       → return line
/// ```
pub fn validate_cart_quantity(qty: i64) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty.abs() > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_ITEM_QUANTITY,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an amount that must be strictly positive (payments, ledger
/// entries, purchases, goal targets).
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    validate_positive_amount("payment amount", cents)
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates a discount: flat must be non-negative, percent at most 100%.
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    match *discount {
        Discount::Flat { cents } if cents < 0 => Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: i64::MAX,
        }),
        Discount::Percent { bps } if bps > 10_000 => Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 10_000,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Collection / Range Validators
// =============================================================================

/// Fails when a cart already holds `MAX_CART_ITEMS` lines.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates an inclusive date range.
pub fn validate_date_range(field: &str, from: NaiveDate, to: NaiveDate) -> ValidationResult<()> {
    if from > to {
        return Err(ValidationError::InvalidRange {
            field: field.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id)
        .map_err(|_| ValidationError::invalid_format("id", "must be a valid UUID"))?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert_eq!(validate_sku("  CAFE-500 ").unwrap(), "CAFE-500");
        assert!(validate_sku("pao_frances").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_names_count_characters() {
        // 200 multi-byte characters is still within the limit
        assert!(validate_product_name(&"ç".repeat(200)).is_ok());
        assert!(validate_product_name(&"ç".repeat(201)).is_err());
        assert!(validate_customer_name("Dona Maria").is_ok());
        assert!(validate_customer_name("").is_err());
    }

    #[test]
    fn test_validate_cart_quantity() {
        assert!(validate_cart_quantity(1).is_ok());
        assert!(validate_cart_quantity(999).is_ok());
        assert!(validate_cart_quantity(-999).is_ok());

        assert!(validate_cart_quantity(0).is_err());
        assert!(validate_cart_quantity(1000).is_err());
        assert!(validate_cart_quantity(-1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(&Discount::Flat { cents: 0 }).is_ok());
        assert!(validate_discount(&Discount::Flat { cents: -1 }).is_err());
        assert!(validate_discount(&Discount::Percent { bps: 10_000 }).is_ok());
        assert!(validate_discount(&Discount::Percent { bps: 10_001 }).is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(validate_date_range("period", jan, feb).is_ok());
        assert!(validate_date_range("period", jan, jan).is_ok());
        assert!(matches!(
            validate_date_range("period", feb, jan),
            Err(ValidationError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(99).is_ok());
        assert!(validate_cart_size(100).is_err());
    }

    #[test]
    fn test_validate_uuid_and_tax() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
        assert!(validate_tax_rate_bps(10_000).is_ok());
        assert!(validate_tax_rate_bps(10_001).is_err());
    }
}
