//! # Caixa Server
//!
//! JSON API over the Caixa repositories and billing service.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caixa Server                                     │
//! │                                                                         │
//! │  Dashboard / POS ──► HTTP (axum) ──► routes ──► caixa-db ──► SQLite     │
//! │                           │                                             │
//! │                           ├──► subscription gate (writes only)          │
//! │                           │                                             │
//! │  Gateway webhook ─────────┴──► caixa-billing ──► Mercado Pago REST      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing
//! 2. Load server and billing config (file, then `CAIXA_*` env)
//! 3. Open the database and run migrations
//! 4. Build the gateway client if credentials are present
//! 5. Serve until Ctrl+C / SIGTERM

pub mod config;
pub mod error;
pub mod gate;
pub mod routes;
pub mod state;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use caixa_billing::{BillingConfig, BillingService, MercadoPagoClient};
use caixa_db::{Database, DbConfig};

pub use config::ServerConfig;
pub use error::{ApiError, ErrorCode};
pub use routes::router;
pub use state::AppState;

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=caixa_db=trace` - Trace for one crate only
/// - Default: `info,caixa=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caixa=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads configuration, opens the database and serves until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let billing_config =
        BillingConfig::load(config.billing_config.clone()).context("loading billing config")?;

    let db_path = config.database_path().context("resolving database path")?;
    let db = Database::new(
        DbConfig::new(&db_path).tenant_id(config.business.tenant_id.clone()),
    )
    .await
    .context("opening database")?;

    let gateway = if billing_config.is_enabled() {
        Some(
            MercadoPagoClient::new(&billing_config.gateway, &billing_config.checkout)
                .context("building payment gateway client")?,
        )
    } else {
        warn!("Billing access token not set, checkout and webhooks are disabled");
        None
    };

    let addr = config.bind_addr()?;
    let billing = BillingService::new(gateway, &db, billing_config);
    let state = AppState::new(db.clone(), billing, config);
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Caixa server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
