//! Shared handler state.

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::{NaiveDate, Utc};

use caixa_billing::BillingService;
use caixa_db::Database;

use crate::config::ServerConfig;

/// Everything a handler may extract. Each field is cheap to clone.
pub struct AppState<G> {
    pub db: Database,
    pub billing: Arc<BillingService<G>>,
    pub config: Arc<ServerConfig>,
}

impl<G> AppState<G> {
    pub fn new(db: Database, billing: BillingService<G>, config: ServerConfig) -> Self {
        AppState {
            db,
            billing: Arc::new(billing),
            config: Arc::new(config),
        }
    }
}

// Derived Clone would require G: Clone
impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        AppState {
            db: self.db.clone(),
            billing: Arc::clone(&self.billing),
            config: Arc::clone(&self.config),
        }
    }
}

impl<G> FromRef<AppState<G>> for Database {
    fn from_ref(state: &AppState<G>) -> Self {
        state.db.clone()
    }
}

impl<G> FromRef<AppState<G>> for Arc<BillingService<G>> {
    fn from_ref(state: &AppState<G>) -> Self {
        Arc::clone(&state.billing)
    }
}

impl<G> FromRef<AppState<G>> for Arc<ServerConfig> {
    fn from_ref(state: &AppState<G>) -> Self {
        Arc::clone(&state.config)
    }
}

/// Business date used for every "today" calculation.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
