//! # Repository Module
//!
//! Database repository implementations for Caixa.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Route handler                                                          │
//! │       │                                                                 │
//! │       │  db.customers().register_payment(id, input)                     │
//! │       ▼                                                                 │
//! │  CustomerRepository                                                     │
//! │  ├── loads rows (tenant scoped)                                         │
//! │  ├── calls caixa-core (pendency::allocate)                              │
//! │  └── writes the result in one transaction                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business decisions stay in caixa-core; repositories only move rows.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog, search, stock
//! - [`ledger::LedgerRepository`] - Cash-flow transactions
//! - [`customer::CustomerRepository`] - Customers, purchases, payments
//! - [`sale::SaleRepository`] - POS checkout and voids
//! - [`goal::GoalRepository`] - Goals and their achieved values
//! - [`subscription::SubscriptionRepository`] - Subscription row and billing payments
//! - [`report::ReportRepository`] - Dashboard aggregation

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

pub mod customer;
pub mod goal;
pub mod ledger;
pub mod product;
pub mod report;
pub mod sale;
pub mod subscription;

/// Generates a new record ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Half-open string bounds `[from, to + 1 day)` for comparing RFC 3339
/// timestamp columns against an inclusive date range.
pub(crate) fn timestamp_bounds(from: NaiveDate, to: NaiveDate) -> (String, String) {
    (from.to_string(), (to + Duration::days(1)).to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }
}
