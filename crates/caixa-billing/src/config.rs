//! # Billing Configuration
//!
//! Gateway credentials, plan prices and checkout URLs.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! defaults ──► billing.toml ──► CAIXA_GATEWAY_* env ──► validate()
//! ```
//!
//! ## Example billing.toml
//! ```toml
//! [gateway]
//! base_url = "https://api.mercadopago.com"
//! access_token = "APP_USR-..."
//! webhook_secret = "..."
//! timeout_secs = 15
//!
//! [plans]
//! default_plan = "monthly"
//! trial_days = 14
//! monthly_cents = 4990
//! quarterly_cents = 13990
//! annual_cents = 49900
//!
//! [checkout]
//! notification_url = "https://caixa.example.com/webhooks/billing"
//! success_url = "https://caixa.example.com/assinatura?status=ok"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use caixa_core::subscription::Plan;
use caixa_core::Money;

use crate::error::{BillingError, BillingResult};

// =============================================================================
// Gateway Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Empty disables billing.
    #[serde(default)]
    pub access_token: String,

    /// Secret for `x-signature` webhook verification.
    #[serde(default)]
    pub webhook_secret: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// ISO 4217 code sent with checkout items.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_base_url() -> String {
    "https://api.mercadopago.com".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_currency() -> String {
    "BRL".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            base_url: default_base_url(),
            access_token: String::new(),
            webhook_secret: String::new(),
            timeout_secs: default_timeout_secs(),
            currency: default_currency(),
        }
    }
}

impl GatewaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Plan Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSettings {
    /// Plan a new tenant's trial starts on.
    #[serde(default)]
    pub default_plan: Plan,

    #[serde(default = "default_trial_days")]
    pub trial_days: i64,

    #[serde(default = "default_monthly_cents")]
    pub monthly_cents: i64,

    #[serde(default = "default_quarterly_cents")]
    pub quarterly_cents: i64,

    #[serde(default = "default_annual_cents")]
    pub annual_cents: i64,
}

fn default_trial_days() -> i64 {
    14
}

fn default_monthly_cents() -> i64 {
    4990
}

fn default_quarterly_cents() -> i64 {
    13990
}

fn default_annual_cents() -> i64 {
    49900
}

impl Default for PlanSettings {
    fn default() -> Self {
        PlanSettings {
            default_plan: Plan::default(),
            trial_days: default_trial_days(),
            monthly_cents: default_monthly_cents(),
            quarterly_cents: default_quarterly_cents(),
            annual_cents: default_annual_cents(),
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// URLs handed to the gateway when a checkout is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Where the gateway posts payment notifications.
    #[serde(default)]
    pub notification_url: Option<String>,

    #[serde(default)]
    pub success_url: Option<String>,

    #[serde(default)]
    pub failure_url: Option<String>,

    #[serde(default)]
    pub pending_url: Option<String>,
}

// =============================================================================
// Billing Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub plans: PlanSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,
}

impl BillingConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> BillingResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading billing config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Billing config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load billing config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> BillingResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| BillingError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Billing config saved");
        Ok(())
    }

    pub fn validate(&self) -> BillingResult<()> {
        let url = &self.gateway.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BillingError::InvalidConfig(format!(
                "Gateway URL must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.gateway.timeout_secs == 0 {
            return Err(BillingError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.is_enabled() && self.gateway.webhook_secret.is_empty() {
            return Err(BillingError::InvalidConfig(
                "webhook_secret is required when an access token is set".into(),
            ));
        }

        if self.plans.trial_days < 0 {
            return Err(BillingError::InvalidConfig(
                "trial_days cannot be negative".into(),
            ));
        }

        for plan in [Plan::Monthly, Plan::Quarterly, Plan::Annual] {
            if !self.price_for(plan).is_positive() {
                return Err(BillingError::InvalidConfig(format!(
                    "{} price must be greater than 0",
                    plan
                )));
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `CAIXA_GATEWAY_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CAIXA_GATEWAY_BASE_URL") {
            debug!(url = %url, "Overriding gateway URL from environment");
            self.gateway.base_url = url;
        }

        if let Some(token) = lookup("CAIXA_GATEWAY_ACCESS_TOKEN") {
            self.gateway.access_token = token;
        }

        if let Some(secret) = lookup("CAIXA_GATEWAY_WEBHOOK_SECRET") {
            self.gateway.webhook_secret = secret;
        }

        if let Some(timeout) = lookup("CAIXA_GATEWAY_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.gateway.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid gateway timeout"),
            }
        }

        if let Some(url) = lookup("CAIXA_GATEWAY_NOTIFICATION_URL") {
            debug!(url = %url, "Overriding notification URL from environment");
            self.checkout.notification_url = Some(url);
        }

        if let Some(plan) = lookup("CAIXA_GATEWAY_DEFAULT_PLAN") {
            match plan.parse::<Plan>() {
                Ok(parsed) => self.plans.default_plan = parsed,
                Err(_) => warn!(plan = %plan, "Unknown plan in environment"),
            }
        }

        if let Some(days) = lookup("CAIXA_GATEWAY_TRIAL_DAYS") {
            if let Ok(d) = days.parse::<i64>() {
                self.plans.trial_days = d;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "caixa", "caixa")
            .map(|dirs| dirs.config_dir().join("billing.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns true when an access token is configured.
    pub fn is_enabled(&self) -> bool {
        !self.gateway.access_token.is_empty()
    }

    pub fn price_for(&self, plan: Plan) -> Money {
        Money::from_cents(match plan {
            Plan::Monthly => self.plans.monthly_cents,
            Plan::Quarterly => self.plans.quarterly_cents,
            Plan::Annual => self.plans.annual_cents,
        })
    }
}
