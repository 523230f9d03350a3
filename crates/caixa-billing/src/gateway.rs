//! # Payment Gateway
//!
//! [`PaymentGateway`] is the seam between billing logic and the provider.
//! [`MercadoPagoClient`] is the production implementation. Tests substitute
//! an in-memory fake.
//!
//! ## Calls
//! ```text
//! create_checkout ──► POST /checkout/preferences   (not retried)
//! get_payment     ──► GET  /v1/payments/{id}       (retried on 429/5xx/timeouts)
//! ```
//!
//! Amounts cross the wire as decimal numbers (`49.9`) and are converted to
//! and from centavos at this boundary only.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use caixa_core::subscription::Plan;
use caixa_core::Money;

use crate::config::{CheckoutSettings, GatewaySettings};
use crate::error::{BillingError, BillingResult};

// =============================================================================
// Gateway Types
// =============================================================================

/// A checkout for one period of `plan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub plan: Plan,
    pub title: String,
    pub amount: Money,
    pub payer_email: Option<String>,
    /// Echoed back on the payment; identifies tenant and plan.
    pub external_reference: String,
}

/// Where to send the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLink {
    pub preference_id: String,
    pub init_point: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Authorized,
    InProcess,
    InMediation,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    Unknown,
}

impl PaymentStatus {
    /// Maps the gateway's status string. New statuses become `Unknown`.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "pending" => PaymentStatus::Pending,
            "approved" => PaymentStatus::Approved,
            "authorized" => PaymentStatus::Authorized,
            "in_process" => PaymentStatus::InProcess,
            "in_mediation" => PaymentStatus::InMediation,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" => PaymentStatus::Cancelled,
            "refunded" => PaymentStatus::Refunded,
            "charged_back" => PaymentStatus::ChargedBack,
            _ => PaymentStatus::Unknown,
        }
    }
}

/// A payment as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub external_reference: Option<String>,
    pub amount: Money,
    /// Local date of approval, as stamped by the gateway.
    pub approved_on: Option<NaiveDate>,
}

/// Operations billing needs from a payment provider.
pub trait PaymentGateway: Send + Sync {
    fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> impl Future<Output = BillingResult<CheckoutLink>> + Send;

    fn get_payment(&self, id: &str) -> impl Future<Output = BillingResult<GatewayPayment>> + Send;
}

/// No gateway when billing has no credentials.
impl<G: PaymentGateway> PaymentGateway for Option<G> {
    async fn create_checkout(&self, request: &CheckoutRequest) -> BillingResult<CheckoutLink> {
        match self {
            Some(gateway) => gateway.create_checkout(request).await,
            None => Err(BillingError::NotConfigured),
        }
    }

    async fn get_payment(&self, id: &str) -> BillingResult<GatewayPayment> {
        match self {
            Some(gateway) => gateway.get_payment(id).await,
            None => Err(BillingError::NotConfigured),
        }
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Serialize)]
struct PreferenceBody<'a> {
    items: [PreferenceItem<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<Payer<'a>>,
    external_reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    back_urls: Option<BackUrls<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_return: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct PreferenceItem<'a> {
    id: &'static str,
    title: &'a str,
    quantity: u32,
    currency_id: &'a str,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct Payer<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct BackUrls<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: u64,
    status: String,
    #[serde(default)]
    external_reference: Option<String>,
    transaction_amount: f64,
    #[serde(default)]
    date_approved: Option<DateTime<FixedOffset>>,
}

impl TryFrom<PaymentResponse> for GatewayPayment {
    type Error = BillingError;

    fn try_from(wire: PaymentResponse) -> BillingResult<Self> {
        let amount = decimal_to_money(wire.transaction_amount).ok_or_else(|| {
            BillingError::InvalidNotification(format!(
                "payment {} has an unusable amount: {}",
                wire.id, wire.transaction_amount
            ))
        })?;

        Ok(GatewayPayment {
            id: wire.id.to_string(),
            status: PaymentStatus::from_wire(&wire.status),
            external_reference: wire.external_reference.filter(|r| !r.is_empty()),
            amount,
            approved_on: wire.date_approved.map(|d| d.date_naive()),
        })
    }
}

/// Converts a decimal amount to centavos. `None` when it is not finite or
/// does not fit in an `i64`.
fn decimal_to_money(amount: f64) -> Option<Money> {
    let cents = (amount * 100.0).round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if !cents.is_finite() || cents < i64::MIN as f64 || cents >= i64::MAX as f64 {
        return None;
    }
    Some(Money::from_cents(cents as i64))
}

fn money_to_decimal(amount: Money) -> f64 {
    amount.cents() as f64 / 100.0
}

// =============================================================================
// Mercado Pago Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct MercadoPagoClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    currency: String,
    checkout: CheckoutSettings,
    max_elapsed: Duration,
}

impl MercadoPagoClient {
    pub fn new(gateway: &GatewaySettings, checkout: &CheckoutSettings) -> BillingResult<Self> {
        if gateway.access_token.is_empty() {
            return Err(BillingError::NotConfigured);
        }

        let http = reqwest::Client::builder()
            .timeout(gateway.timeout())
            .build()?;

        Ok(MercadoPagoClient {
            http,
            base_url: gateway.base_url.trim_end_matches('/').to_string(),
            access_token: gateway.access_token.clone(),
            currency: gateway.currency.clone(),
            checkout: checkout.clone(),
            max_elapsed: gateway.timeout() * 2,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_payment(&self, id: &str) -> BillingResult<GatewayPayment> {
        let response = self
            .http
            .get(self.url(&format!("/v1/payments/{}", id)))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let payment: PaymentResponse = read_json(response).await?;
        payment.try_into()
    }
}

/// Decodes a success body, or turns the status and body into a gateway error.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> BillingResult<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(BillingError::Gateway {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json::<T>().await?)
}

impl PaymentGateway for MercadoPagoClient {
    async fn create_checkout(&self, request: &CheckoutRequest) -> BillingResult<CheckoutLink> {
        let has_back_urls = self.checkout.success_url.is_some()
            || self.checkout.failure_url.is_some()
            || self.checkout.pending_url.is_some();

        let body = PreferenceBody {
            items: [PreferenceItem {
                id: request.plan.as_str(),
                title: &request.title,
                quantity: 1,
                currency_id: &self.currency,
                unit_price: money_to_decimal(request.amount),
            }],
            payer: request.payer_email.as_deref().map(|email| Payer { email }),
            external_reference: &request.external_reference,
            notification_url: self.checkout.notification_url.as_deref(),
            back_urls: has_back_urls.then(|| BackUrls {
                success: self.checkout.success_url.as_deref(),
                failure: self.checkout.failure_url.as_deref(),
                pending: self.checkout.pending_url.as_deref(),
            }),
            auto_return: self.checkout.success_url.is_some().then_some("approved"),
        };

        debug!(plan = %request.plan, amount = %request.amount, "Creating checkout preference");

        let response = self
            .http
            .post(self.url("/checkout/preferences"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let preference: PreferenceResponse = read_json(response).await?;
        Ok(CheckoutLink {
            preference_id: preference.id,
            init_point: preference.init_point,
        })
    }

    async fn get_payment(&self, id: &str) -> BillingResult<GatewayPayment> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.max_elapsed),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, move || async move {
            self.fetch_payment(id).await.map_err(|e| {
                if e.is_retryable() {
                    warn!(payment_id = %id, error = %e, "Gateway read failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }
}
