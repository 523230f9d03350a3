//! # Server Configuration
//!
//! Business identity, money formatting, tax mode, bind address and database
//! location.
//!
//! ## Configuration Sources (later overrides earlier)
//! 1. Defaults (this file)
//! 2. Config file (`server.toml`)
//! 3. Environment variables (`CAIXA_*`)
//!
//! Read-only after startup; handlers get it behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use caixa_core::validation::validate_tax_rate_bps;
use caixa_core::{TaxMode, DEFAULT_TENANT_ID};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid server configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Business Settings
// =============================================================================

/// What the dashboard needs to present money and taxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessSettings {
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    /// Shown on receipts and the dashboard header.
    #[serde(default = "default_business_name")]
    pub name: String,

    /// ISO 4217
    #[serde(default = "default_currency_code")]
    pub currency_code: String,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    #[serde(default = "default_currency_decimals")]
    pub currency_decimals: u8,

    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: String,

    /// Pre-filled on new products, in basis points.
    #[serde(default)]
    pub default_tax_rate_bps: u32,

    #[serde(default = "default_tax_mode")]
    pub tax_mode: TaxMode,
}

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

fn default_business_name() -> String {
    "Minha Loja".to_string()
}

fn default_currency_code() -> String {
    "BRL".to_string()
}

fn default_currency_symbol() -> String {
    "R$".to_string()
}

fn default_currency_decimals() -> u8 {
    2
}

fn default_decimal_separator() -> String {
    ",".to_string()
}

fn default_tax_mode() -> TaxMode {
    TaxMode::Inclusive
}

impl Default for BusinessSettings {
    fn default() -> Self {
        BusinessSettings {
            tenant_id: default_tenant_id(),
            name: default_business_name(),
            currency_code: default_currency_code(),
            currency_symbol: default_currency_symbol(),
            currency_decimals: default_currency_decimals(),
            decimal_separator: default_decimal_separator(),
            default_tax_rate_bps: 0,
            tax_mode: default_tax_mode(),
        }
    }
}

// =============================================================================
// HTTP and Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Server Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub business: BusinessSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    /// `billing.toml` location, if not the default.
    #[serde(default)]
    pub billing_config: Option<PathBuf>,
}

impl ServerConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading server config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Server config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.business.tenant_id.trim().is_empty() {
            return Err(ConfigError::Invalid("tenant_id cannot be empty".into()));
        }

        if self.business.currency_decimals > 4 {
            return Err(ConfigError::Invalid(
                "currency_decimals must be between 0 and 4".into(),
            ));
        }

        validate_tax_rate_bps(self.business.default_tax_rate_bps)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        self.bind_addr()?;
        Ok(())
    }

    /// Applies `CAIXA_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(tenant_id) = lookup("CAIXA_TENANT_ID") {
            debug!(tenant_id = %tenant_id, "Overriding tenant ID from environment");
            self.business.tenant_id = tenant_id;
        }

        if let Some(name) = lookup("CAIXA_BUSINESS_NAME") {
            self.business.name = name;
        }

        // Percent, e.g. "17.5"
        if let Some(rate) = lookup("CAIXA_TAX_RATE") {
            match rate.parse::<f64>() {
                Ok(pct) if pct >= 0.0 => self.business.default_tax_rate_bps = (pct * 100.0).round() as u32,
                _ => warn!(rate = %rate, "Ignoring invalid tax rate in environment"),
            }
        }

        if let Some(mode) = lookup("CAIXA_TAX_MODE") {
            match mode.to_lowercase().as_str() {
                "inclusive" => self.business.tax_mode = TaxMode::Inclusive,
                "exclusive" => self.business.tax_mode = TaxMode::Exclusive,
                _ => warn!(mode = %mode, "Unknown tax mode in environment"),
            }
        }

        if let Some(addr) = lookup("CAIXA_BIND_ADDR") {
            debug!(addr = %addr, "Overriding bind address from environment");
            self.http.bind_addr = addr;
        }

        if let Some(path) = lookup("CAIXA_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("CAIXA_BILLING_CONFIG") {
            self.billing_config = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "caixa", "caixa")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("server.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http.bind_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!("bind_addr is not host:port: {}", self.http.bind_addr))
        })
    }

    /// Database file, creating its directory if needed.
    ///
    /// ## Platform-Specific Defaults
    /// - **Linux**: `~/.local/share/caixa/caixa.db`
    /// - **macOS**: `~/Library/Application Support/com.caixa.caixa/caixa.db`
    /// - **Windows**: `%APPDATA%\caixa\caixa\data\caixa.db`
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let path = match &self.database.path {
            Some(path) => path.clone(),
            None => Self::project_dirs()
                .ok_or_else(|| ConfigError::Invalid("Could not determine data directory".into()))?
                .data_dir()
                .join("caixa.db"),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Formats a cent amount for display.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let config = ServerConfig::default();
    /// assert_eq!(config.format_currency(123456), "R$ 1234,56");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let business = &self.business;
        let decimals = business.currency_decimals as u32;
        let divisor = 10_i64.pow(decimals);
        let whole = (cents / divisor).abs();
        let frac = (cents % divisor).abs();
        let sign = if cents < 0 { "-" } else { "" };

        if decimals == 0 {
            format!("{}{} {}", sign, business.currency_symbol, whole)
        } else {
            format!(
                "{}{} {}{}{:0width$}",
                sign,
                business.currency_symbol,
                whole,
                business.decimal_separator,
                frac,
                width = decimals as usize
            )
        }
    }
}
