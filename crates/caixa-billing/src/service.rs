//! # Billing Service
//!
//! Ties the gateway, the webhook check and the subscription row together.
//!
//! ## Notification Flow
//! ```text
//! POST /webhooks/billing
//!      │
//!      ▼
//! parse body ──► verify x-signature ──► topic != payment? ──► Ignored
//!      │
//!      ▼
//! gateway.get_payment(data.id)
//!      │
//!      ├── status != approved ──────────────────────────────► Pending
//!      ├── reference not "{tenant}:{plan}" / amount short ──► PaymentRejected
//!      ▼
//! subscriptions.apply_gateway_payment
//!      ├── new payment id ──► Applied { paid_through }
//!      └── seen before   ──► AlreadyApplied
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use caixa_core::subscription::{evaluate, AccessState, Period, Plan};
use caixa_core::{BillingPayment, Money, SubscriptionRecord, ValidationError};
use caixa_db::repository::subscription::GatewayPaymentRecord;
use caixa_db::{Database, SubscriptionRepository};

use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::gateway::{CheckoutLink, CheckoutRequest, PaymentGateway, PaymentStatus};
use crate::webhook;

/// Subscription as shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    pub subscription: SubscriptionRecord,
    pub access: AccessState,
    pub current_period: Option<Period>,
    /// Price of one period of the current plan.
    pub price_cents: i64,
    pub billing_enabled: bool,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Applied {
        payment_id: String,
        paid_through: Option<NaiveDate>,
    },
    AlreadyApplied {
        payment_id: String,
    },
    /// Payment exists but is not approved yet (or was refused).
    Pending {
        payment_id: String,
        status: PaymentStatus,
    },
    Ignored {
        topic: String,
    },
}

/// `{tenant_id}:{plan}`, echoed back by the gateway on the payment.
pub fn external_reference(tenant_id: &str, plan: Plan) -> String {
    format!("{}:{}", tenant_id, plan)
}

/// Splits an external reference. `None` when it is not ours.
pub fn parse_external_reference(reference: &str) -> Option<(&str, Plan)> {
    let (tenant_id, plan) = reference.rsplit_once(':')?;
    if tenant_id.is_empty() {
        return None;
    }
    Some((tenant_id, plan.parse().ok()?))
}

pub struct BillingService<G> {
    gateway: G,
    subscriptions: SubscriptionRepository,
    config: BillingConfig,
    tenant_id: String,
}

impl<G: PaymentGateway> BillingService<G> {
    pub fn new(gateway: G, db: &Database, config: BillingConfig) -> Self {
        BillingService {
            gateway,
            subscriptions: db.subscriptions(),
            config,
            tenant_id: db.tenant_id().to_string(),
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    async fn subscription(&self, today: NaiveDate) -> BillingResult<SubscriptionRecord> {
        let record = self
            .subscriptions
            .get_or_start(
                self.config.plans.default_plan,
                self.config.plans.trial_days,
                today,
            )
            .await?;
        Ok(record)
    }

    /// Current subscription and its access state, starting the trial on
    /// first use.
    pub async fn status(&self, today: NaiveDate) -> BillingResult<SubscriptionStatus> {
        let record = self.subscription(today).await?;
        Ok(self.describe(record, today))
    }

    fn describe(&self, record: SubscriptionRecord, today: NaiveDate) -> SubscriptionStatus {
        let terms = record.terms();
        SubscriptionStatus {
            access: evaluate(&terms, today),
            current_period: terms.current_period(),
            price_cents: self.config.price_for(record.plan).cents(),
            billing_enabled: self.config.is_enabled(),
            subscription: record,
        }
    }

    /// Creates a checkout for one period of `plan` (default: the current plan).
    pub async fn start_checkout(
        &self,
        plan: Option<Plan>,
        payer_email: Option<String>,
        today: NaiveDate,
    ) -> BillingResult<CheckoutLink> {
        if !self.config.is_enabled() {
            return Err(BillingError::NotConfigured);
        }

        let payer_email = payer_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        if let Some(email) = &payer_email {
            if !email.contains('@') {
                return Err(ValidationError::invalid_format(
                    "payer_email",
                    "must be an email address",
                )
                .into());
            }
        }

        let record = self.subscription(today).await?;
        let plan = plan.unwrap_or(record.plan);
        let amount = self.config.price_for(plan);

        let request = CheckoutRequest {
            plan,
            title: format!("Caixa - plano {}", plan_label(plan)),
            amount,
            payer_email,
            external_reference: external_reference(&self.tenant_id, plan),
        };

        let link = self.gateway.create_checkout(&request).await?;
        info!(
            plan = %plan,
            amount = %amount,
            preference_id = %link.preference_id,
            "Checkout created"
        );
        Ok(link)
    }

    /// Processes one webhook delivery.
    ///
    /// Safe to call repeatedly for the same payment.
    pub async fn handle_notification(
        &self,
        signature: &str,
        request_id: &str,
        body: &[u8],
        today: NaiveDate,
    ) -> BillingResult<NotificationOutcome> {
        let notification = webhook::parse_notification(body)?;

        if let Err(e) = webhook::verify(
            &self.config.gateway.webhook_secret,
            signature,
            request_id,
            &notification.data.id,
        ) {
            warn!(request_id = %request_id, error = %e, "Webhook rejected");
            return Err(e);
        }

        if !notification.is_payment() {
            debug!(topic = %notification.kind, "Ignoring non-payment notification");
            return Ok(NotificationOutcome::Ignored {
                topic: notification.kind,
            });
        }

        let payment = self.gateway.get_payment(&notification.data.id).await?;

        if payment.status != PaymentStatus::Approved {
            debug!(payment_id = %payment.id, status = ?payment.status, "Payment not approved");
            return Ok(NotificationOutcome::Pending {
                payment_id: payment.id,
                status: payment.status,
            });
        }

        let plan = match payment
            .external_reference
            .as_deref()
            .and_then(parse_external_reference)
        {
            Some((tenant_id, plan)) if tenant_id == self.tenant_id => plan,
            _ => {
                warn!(payment_id = %payment.id, reference = ?payment.external_reference, "Payment for another tenant");
                return Err(BillingError::PaymentRejected {
                    payment_id: payment.id,
                    reason: "external reference does not match this subscription".into(),
                });
            }
        };

        let price = self.config.price_for(plan);
        if payment.amount < price {
            warn!(payment_id = %payment.id, amount = %payment.amount, price = %price, "Payment short");
            return Err(BillingError::PaymentRejected {
                payment_id: payment.id,
                reason: format!("paid {} but {} costs {}", payment.amount, plan, price),
            });
        }

        // Trial starts here if the tenant never opened the dashboard
        self.subscription(today).await?;

        let record = GatewayPaymentRecord {
            gateway_payment_id: payment.id.clone(),
            plan,
            amount_cents: payment.amount.cents(),
            paid_on: payment.approved_on.unwrap_or(today),
        };

        match self.subscriptions.apply_gateway_payment(&record).await? {
            Some(renewed) => Ok(NotificationOutcome::Applied {
                payment_id: payment.id,
                paid_through: renewed.paid_through,
            }),
            None => Ok(NotificationOutcome::AlreadyApplied {
                payment_id: payment.id,
            }),
        }
    }

    /// Cancels at the end of the covered period.
    pub async fn cancel(&self, today: NaiveDate) -> BillingResult<SubscriptionStatus> {
        let mut terms = self.subscription(today).await?.terms();
        terms.cancel(today);
        let record = self.subscriptions.save(&terms).await?;
        info!(tenant_id = %self.tenant_id, "Subscription canceled");
        Ok(self.describe(record, today))
    }

    pub async fn payments(&self) -> BillingResult<Vec<BillingPayment>> {
        Ok(self.subscriptions.list_payments().await?)
    }

    /// Price of `plan` from config.
    pub fn price(&self, plan: Plan) -> Money {
        self.config.price_for(plan)
    }
}

fn plan_label(plan: Plan) -> &'static str {
    match plan {
        Plan::Monthly => "mensal",
        Plan::Quarterly => "trimestral",
        Plan::Annual => "anual",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayPayment;
    use caixa_core::subscription::AccessTone;
    use caixa_db::DbConfig;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SECRET: &str = "test-secret";

    #[derive(Default)]
    struct FakeGateway {
        payments: Mutex<HashMap<String, GatewayPayment>>,
        checkouts: Mutex<Vec<CheckoutRequest>>,
    }

    impl FakeGateway {
        fn with_payment(payment: GatewayPayment) -> Self {
            let gateway = FakeGateway::default();
            gateway
                .payments
                .lock()
                .unwrap()
                .insert(payment.id.clone(), payment);
            gateway
        }
    }

    impl PaymentGateway for FakeGateway {
        async fn create_checkout(&self, request: &CheckoutRequest) -> BillingResult<CheckoutLink> {
            self.checkouts.lock().unwrap().push(request.clone());
            Ok(CheckoutLink {
                preference_id: "pref-1".into(),
                init_point: "https://gateway.test/checkout/pref-1".into(),
            })
        }

        async fn get_payment(&self, id: &str) -> BillingResult<GatewayPayment> {
            self.payments
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or(BillingError::Gateway {
                    status: 404,
                    message: "not found".into(),
                })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> BillingConfig {
        let mut config = BillingConfig::default();
        config.gateway.access_token = "TEST-token".into();
        config.gateway.webhook_secret = SECRET.into();
        config
    }

    fn approved(id: &str, reference: &str, cents: i64, on: NaiveDate) -> GatewayPayment {
        GatewayPayment {
            id: id.into(),
            status: PaymentStatus::Approved,
            external_reference: Some(reference.into()),
            amount: Money::from_cents(cents),
            approved_on: Some(on),
        }
    }

    fn signed(payment_id: &str) -> (String, String, Vec<u8>) {
        let request_id = format!("req-{}", payment_id);
        let ts = "1742505638683";
        let v1 = webhook::sign(SECRET, &webhook::manifest(payment_id, &request_id, ts)).unwrap();
        let body = format!(r#"{{"type":"payment","action":"payment.updated","data":{{"id":"{}"}}}}"#, payment_id);
        (format!("ts={},v1={}", ts, v1), request_id, body.into_bytes())
    }

    async fn service(gateway: FakeGateway) -> BillingService<FakeGateway> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        BillingService::new(gateway, &db, config())
    }

    fn reference(plan: Plan) -> String {
        external_reference(caixa_core::DEFAULT_TENANT_ID, plan)
    }

    #[test]
    fn test_external_reference_round_trip() {
        let reference = external_reference("tenant-1", Plan::Quarterly);
        assert_eq!(reference, "tenant-1:quarterly");
        assert_eq!(parse_external_reference(&reference), Some(("tenant-1", Plan::Quarterly)));
        assert_eq!(parse_external_reference("tenant-1:weekly"), None);
        assert_eq!(parse_external_reference(":monthly"), None);
        assert_eq!(parse_external_reference("nothing"), None);
    }

    #[tokio::test]
    async fn test_status_starts_trial() {
        let billing = service(FakeGateway::default()).await;
        let status = billing.status(date(2026, 3, 10)).await.unwrap();
        assert_eq!(status.access.tone, AccessTone::Trial);
        assert_eq!(status.access.days_remaining, 14);
        assert_eq!(status.price_cents, 4990);
        assert!(status.billing_enabled);
        assert!(status.current_period.is_none());
    }

    #[tokio::test]
    async fn test_checkout_uses_plan_price() {
        let billing = service(FakeGateway::default()).await;
        let link = billing
            .start_checkout(Some(Plan::Annual), Some(" dono@loja.com ".into()), date(2026, 3, 10))
            .await
            .unwrap();
        assert_eq!(link.preference_id, "pref-1");

        let sent = billing.gateway.checkouts.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].amount.cents(), 49900);
        assert_eq!(sent[0].external_reference, reference(Plan::Annual));
        assert_eq!(sent[0].payer_email.as_deref(), Some("dono@loja.com"));
    }

    #[tokio::test]
    async fn test_checkout_rejects_bad_email_and_missing_token() {
        let billing = service(FakeGateway::default()).await;
        let err = billing
            .start_checkout(None, Some("not-an-email".into()), date(2026, 3, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let disabled = BillingService::new(FakeGateway::default(), &db, BillingConfig::default());
        assert!(matches!(
            disabled.start_checkout(None, None, date(2026, 3, 10)).await,
            Err(BillingError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_approved_payment_applied_once() {
        let paid_on = date(2026, 3, 20);
        let gateway = FakeGateway::with_payment(approved("555", &reference(Plan::Monthly), 4990, paid_on));
        let billing = service(gateway).await;
        billing.status(date(2026, 3, 10)).await.unwrap();

        let (signature, request_id, body) = signed("555");
        let outcome = billing
            .handle_notification(&signature, &request_id, &body, paid_on)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::Applied {
                payment_id: "555".into(),
                paid_through: Some(date(2026, 4, 20)),
            }
        );

        let replay = billing
            .handle_notification(&signature, &request_id, &body, paid_on)
            .await
            .unwrap();
        assert_eq!(
            replay,
            NotificationOutcome::AlreadyApplied {
                payment_id: "555".into()
            }
        );

        let status = billing.status(date(2026, 3, 25)).await.unwrap();
        assert_eq!(status.access.tone, AccessTone::Active);
        assert_eq!(billing.payments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let gateway = FakeGateway::with_payment(approved("7", &reference(Plan::Monthly), 4990, date(2026, 3, 20)));
        let billing = service(gateway).await;

        let (_, request_id, body) = signed("7");
        let err = billing
            .handle_notification("ts=1,v1=deadbeef", &request_id, &body, date(2026, 3, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_pending_and_foreign_payments() {
        let mut pending = approved("8", &reference(Plan::Monthly), 4990, date(2026, 3, 20));
        pending.status = PaymentStatus::InProcess;
        let gateway = FakeGateway::with_payment(pending);
        gateway.payments.lock().unwrap().insert(
            "9".into(),
            approved("9", "someone-else:monthly", 4990, date(2026, 3, 20)),
        );
        gateway.payments.lock().unwrap().insert(
            "10".into(),
            approved("10", &reference(Plan::Annual), 4990, date(2026, 3, 20)),
        );
        let billing = service(gateway).await;
        let today = date(2026, 3, 20);

        let (sig, req, body) = signed("8");
        let outcome = billing.handle_notification(&sig, &req, &body, today).await.unwrap();
        assert!(matches!(outcome, NotificationOutcome::Pending { status: PaymentStatus::InProcess, .. }));

        let (sig, req, body) = signed("9");
        let err = billing.handle_notification(&sig, &req, &body, today).await.unwrap_err();
        assert!(matches!(err, BillingError::PaymentRejected { .. }));

        // Monthly price paid for the annual plan
        let (sig, req, body) = signed("10");
        let err = billing.handle_notification(&sig, &req, &body, today).await.unwrap_err();
        assert!(matches!(err, BillingError::PaymentRejected { .. }));

        let status = billing.status(today).await.unwrap();
        assert!(status.subscription.paid_through.is_none());
    }

    #[tokio::test]
    async fn test_non_payment_topic_ignored() {
        let billing = service(FakeGateway::default()).await;
        let request_id = "req-x";
        let ts = "1";
        let v1 = webhook::sign(SECRET, &webhook::manifest("77", request_id, ts)).unwrap();
        let outcome = billing
            .handle_notification(
                &format!("ts={},v1={}", ts, v1),
                request_id,
                br#"{"type":"subscription_preapproval","data":{"id":"77"}}"#,
                date(2026, 3, 20),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::Ignored {
                topic: "subscription_preapproval".into()
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_blocks_after_coverage() {
        let billing = service(FakeGateway::default()).await;
        let status = billing.cancel(date(2026, 3, 10)).await.unwrap();
        assert_eq!(status.subscription.canceled_on, Some(date(2026, 3, 10)));
        assert_eq!(status.access.tone, AccessTone::Trial);

        let later = billing.status(date(2026, 3, 24)).await.unwrap();
        assert_eq!(later.access.tone, AccessTone::Blocked);
    }
}
