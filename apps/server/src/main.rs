//! # Caixa Server Entry Point
//!
//! ```text
//! caixa-server [server.toml]
//! ```
//!
//! Without an argument the config is read from `CAIXA_CONFIG` or the
//! platform config directory. The setup lives in lib.rs for testability.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use caixa_server::{init_tracing, run, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Caixa server...");

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CAIXA_CONFIG").ok())
        .map(PathBuf::from);

    let config = ServerConfig::load(config_path).context("loading server config")?;
    info!(
        tenant_id = %config.business.tenant_id,
        business = %config.business.name,
        tax_mode = ?config.business.tax_mode,
        "Configuration loaded"
    );

    run(config).await
}
