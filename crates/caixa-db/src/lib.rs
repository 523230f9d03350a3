//! # caixa-db: Database Layer for Caixa
//!
//! This crate provides database access for the Caixa backend.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Caixa Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /sales)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     caixa-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │    │ (sale.rs ...) │    │  (embedded)  │    │    │
//! │  │   │               │    │               │    │              │    │    │
//! │  │   │ SqlitePool    │◄───│ SaleRepo      │    │ 001_initial  │    │    │
//! │  │   │ tenant scope  │    │ CustomerRepo  │    │   _schema    │    │    │
//! │  │   │ retry policy  │    │ LedgerRepo    │    │              │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database (WAL)                       │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`retry`] - Backoff on busy writes
//! - [`repository`] - Repository implementations (product, sale, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caixa_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/caixa.db")).await?;
//! let products = db.products().search("café", 20).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use retry::RetryPolicy;

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::goal::GoalRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::subscription::SubscriptionRepository;
