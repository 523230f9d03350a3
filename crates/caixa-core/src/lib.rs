//! # caixa-core: Pure Business Logic for Caixa
//!
//! This crate holds every business rule of Caixa as pure functions with zero
//! I/O dependencies. Anything that needs "today" takes it as an argument.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Caixa Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/server (axum JSON API)                     │   │
//! │  │   /products  /transactions  /customers  /sales  /subscription   │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼──────────────────┐   │
//! │  │   caixa-db (SQLite repos)   │  │  caixa-billing (gateway)      │   │
//! │  └──────────────┬──────────────┘  └────────────┬──────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────────────────▼──────────────────┐   │
//! │  │               ★ caixa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   money   types   cart   pendency   subscription                │   │
//! │  │   ledger  goal    report validation error                       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (centavos)
//! - [`types`] - Domain records (Product, Sale, Purchase, ...)
//! - [`cart`] - POS cart, discounts, tax and change
//! - [`pendency`] - Allocation of customer payments across open purchases
//! - [`subscription`] - Billing periods, grace window and trial countdown
//! - [`ledger`] - Cash-flow running balances and summaries
//! - [`goal`] - Goal progress
//! - [`report`] - Sales summaries and the dashboard report
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use caixa_core::money::Money;
//! use caixa_core::types::TaxRate;
//!
//! let price = Money::from_cents(1099); // R$ 10,99
//! let tax = price.calculate_tax(TaxRate::from_bps(825));
//! assert_eq!(tax.cents(), 91);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod goal;
pub mod ledger;
pub mod money;
pub mod pendency;
pub mod report;
pub mod subscription;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tenant used when none is configured.
///
/// The schema is multi-tenant; a single server instance serves one tenant.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum absolute quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Days a subscription stays usable after its paid period (or trial) ends.
pub const GRACE_DAYS: i64 = 14;
