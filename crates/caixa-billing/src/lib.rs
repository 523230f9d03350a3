//! # caixa-billing: Subscription Billing for Caixa
//!
//! Sells subscription periods through a hosted checkout and turns the
//! gateway's payment notifications into subscription renewals.
//!
//! ## Module Organization
//!
//! - [`config`] - Gateway credentials, plan prices, checkout URLs
//! - [`error`] - Billing error types
//! - [`gateway`] - `PaymentGateway` trait and the Mercado Pago client
//! - [`webhook`] - `x-signature` verification and notification parsing
//! - [`service`] - `BillingService`: checkout, notifications, status
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caixa_billing::{BillingConfig, BillingService, MercadoPagoClient};
//!
//! let config = BillingConfig::load(None)?;
//! let client = MercadoPagoClient::new(&config.gateway, &config.checkout)?;
//! let billing = BillingService::new(client, &db, config);
//!
//! let link = billing.start_checkout(Some(Plan::Annual), None, today).await?;
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod service;
pub mod webhook;

pub use config::BillingConfig;
pub use error::{BillingError, BillingResult};
pub use gateway::{CheckoutLink, CheckoutRequest, GatewayPayment, MercadoPagoClient, PaymentGateway, PaymentStatus};
pub use service::{BillingService, NotificationOutcome, SubscriptionStatus};
