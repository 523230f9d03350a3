//! # Domain Types
//!
//! Core domain types used throughout Caixa.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog            Cash flow             Customers (pendencies)        │
//! │  ──────────         ─────────────         ──────────────────────        │
//! │  Product            LedgerEntry           Customer                      │
//! │                     EntryKind             Purchase                      │
//! │                     EntrySource           PendencyPayment               │
//! │                                           PaymentAllocationRow          │
//! │                                                                         │
//! │  Point of sale      Goals                 Billing                       │
//! │  ─────────────      ─────                 ───────                       │
//! │  Sale               Goal                  SubscriptionRecord            │
//! │  SaleItem           GoalMetric            BillingPayment                │
//! │  SaleStatus                                                             │
//! │  PaymentMethod                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every persisted record has a UUID v4 `id` and the `tenant_id` of the
//! business account that owns it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::pendency::OpenPurchase;
use crate::subscription::{Plan, SubscriptionTerms};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (1 bps = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for configuration input).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Tax calculation mode for the business.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Tax is added on top of the price.
    #[default]
    Exclusive,
    /// Price already includes tax (common for retail in Brazil).
    Inclusive,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,

    /// Stock Keeping Unit - business identifier, unique per tenant.
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,

    /// Price in cents.
    pub price_cents: i64,

    /// Cost in cents (for margin reports).
    pub cost_cents: Option<i64>,

    /// Tax rate in basis points.
    pub tax_rate_bps: u32,

    pub track_inventory: bool,
    pub allow_negative_stock: bool,
    pub current_stock: Option<i64>,

    /// Stock level at or below which the product shows up as low stock.
    pub min_stock: Option<i64>,

    /// Soft delete flag.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Checks if `quantity` units can be sold.
    pub fn can_sell(&self, quantity: i64) -> bool {
        if !self.track_inventory || quantity <= 0 {
            return true;
        }

        let stock = self.current_stock.unwrap_or(0);
        if stock >= quantity {
            return true;
        }

        self.allow_negative_stock
    }

    /// True when tracked stock is at or below `min_stock`.
    pub fn is_low_stock(&self) -> bool {
        match (self.track_inventory, self.min_stock) {
            (true, Some(min)) => self.current_stock.unwrap_or(0) <= min,
            _ => false,
        }
    }

    /// Gross margin in basis points of the price, when the cost is known.
    pub fn margin_bps(&self) -> Option<i64> {
        let cost = self.cost_cents?;
        if self.price_cents <= 0 {
            return None;
        }
        Some((self.price_cents - cost) * 10_000 / self.price_cents)
    }
}

// =============================================================================
// Ledger (cash-flow transactions)
// =============================================================================

/// Direction of a cash-flow entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Income,
    Expense,
}

/// Where a cash-flow entry came from.
///
/// Only `Manual` entries may be deleted directly; the others are owned by
/// the sale or payment that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Manual,
    Sale,
    SaleVoid,
    PendencyPayment,
}

impl std::fmt::Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntrySource::Manual => "manual",
            EntrySource::Sale => "sale",
            EntrySource::SaleVoid => "sale_void",
            EntrySource::PendencyPayment => "pendency_payment",
        };
        write!(f, "{}", name)
    }
}

/// A cash-flow transaction.
///
/// `amount_cents` is always positive; the direction comes from `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub tenant_id: String,
    pub kind: EntryKind,
    pub source: EntrySource,
    pub amount_cents: i64,
    pub category: Option<String>,
    pub description: String,
    #[ts(as = "String")]
    pub occurred_on: NaiveDate,
    /// Sale or payment id for non-manual entries.
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Customers and pendencies
// =============================================================================

/// A customer who may buy on account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// An on-account purchase. Open while `paid_cents < amount_cents`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    /// The POS sale that produced this purchase, if any.
    pub sale_id: Option<String>,
    pub description: String,
    pub amount_cents: i64,
    pub paid_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Purchase {
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.amount_cents - self.paid_cents)
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.paid_cents >= self.amount_cents
    }

    /// The view of this purchase used by [`crate::pendency::allocate`].
    pub fn to_open(&self) -> OpenPurchase {
        OpenPurchase {
            id: self.id.clone(),
            amount: Money::from_cents(self.amount_cents),
            paid: Money::from_cents(self.paid_cents),
            created_at: self.created_at,
        }
    }
}

/// A payment received from a customer against their pendencies.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PendencyPayment {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Portion applied to open purchases.
    pub applied_cents: i64,
    /// Portion left over once every open purchase was settled.
    pub unapplied_cents: i64,
    #[ts(as = "String")]
    pub paid_on: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One purchase's share of a [`PendencyPayment`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentAllocationRow {
    pub id: String,
    pub payment_id: String,
    pub purchase_id: String,
    pub applied_cents: i64,
}

// =============================================================================
// Sales
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and recorded.
    #[default]
    Completed,
    /// Sale was cancelled; stock and cash flow were reversed.
    Voided,
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaleStatus::Completed => write!(f, "completed"),
            SaleStatus::Voided => write!(f, "voided"),
        }
    }
}

/// How a sale or pendency payment was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Pix,
    DebitCard,
    CreditCard,
    /// Charged to the customer's account; creates a pendency.
    OnAccount,
}

impl PaymentMethod {
    /// Only cash produces change.
    pub fn gives_change(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }

    /// Whether money enters the till when this method is used.
    pub fn moves_cash(&self) -> bool {
        !matches!(self, PaymentMethod::OnAccount)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Pix => "pix",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::OnAccount => "on_account",
        };
        write!(f, "{}", name)
    }
}

/// A recorded POS sale.
///
/// A negative `total_cents` is a net return (money back to the customer).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub receipt_number: String,
    pub status: SaleStatus,
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub received_cents: i64,
    pub change_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in a sale. Product data is frozen at the time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: Option<String>,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    /// Negative for returned items.
    pub quantity: i64,
    pub gross_cents: i64,
    /// Line discount plus this line's share of the cart discount.
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub net_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Goals
// =============================================================================

/// What a goal measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GoalMetric {
    /// Sum of completed sale totals, in cents.
    Revenue,
    /// Ledger income minus expense, in cents.
    CashNet,
    /// Number of completed sales.
    SalesCount,
}

/// A target for a date range.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Goal {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    pub metric: GoalMetric,
    /// Cents for money metrics, a plain count for `SalesCount`.
    pub target_value: i64,
    #[ts(as = "String")]
    pub starts_on: NaiveDate,
    #[ts(as = "String")]
    pub ends_on: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Billing
// =============================================================================

/// The tenant's subscription row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SubscriptionRecord {
    pub tenant_id: String,
    pub plan: Plan,
    pub anchor_day: u32,
    #[ts(as = "String")]
    pub started_on: NaiveDate,
    #[ts(as = "String")]
    pub trial_ends_on: NaiveDate,
    #[ts(as = "Option<String>")]
    pub paid_through: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub canceled_on: Option<NaiveDate>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn terms(&self) -> SubscriptionTerms {
        SubscriptionTerms {
            plan: self.plan,
            anchor_day: self.anchor_day,
            trial_ends_on: self.trial_ends_on,
            paid_through: self.paid_through,
            canceled_on: self.canceled_on,
        }
    }

    /// Copies the mutable parts of `terms` back into the record.
    pub fn apply_terms(&mut self, terms: &SubscriptionTerms) {
        self.plan = terms.plan;
        self.anchor_day = terms.anchor_day;
        self.trial_ends_on = terms.trial_ends_on;
        self.paid_through = terms.paid_through;
        self.canceled_on = terms.canceled_on;
    }
}

/// A gateway payment that was applied to the subscription.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BillingPayment {
    pub id: String,
    pub tenant_id: String,
    /// Gateway-side id; unique, so replayed notifications are no-ops.
    pub gateway_payment_id: String,
    pub plan: Plan,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub paid_on: NaiveDate,
    #[ts(as = "String")]
    pub paid_through: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
