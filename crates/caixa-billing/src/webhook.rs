//! # Webhook Verification
//!
//! The gateway signs each notification with the shared webhook secret.
//!
//! ```text
//! x-signature:  ts=1742505638683,v1=ced36ab6d33566bb1e16c125819b8d840d6b8ef136b0b9127c76064466f5229b
//! x-request-id: bb56a2f1-6aae-46ac-982e-9dcd3581d08e
//! body:         {"type":"payment","action":"payment.updated","data":{"id":"123456"}}
//!
//! manifest = "id:123456;request-id:bb56a2f1-...;ts:1742505638683;"
//! v1       = hex(HMAC-SHA256(webhook_secret, manifest))
//! ```

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer};
use sha2::Sha256;

use crate::error::{BillingError, BillingResult};

type HmacSha256 = Hmac<Sha256>;

/// Parsed `x-signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

/// Parses `ts=...,v1=...`. Unknown keys are ignored, order does not matter.
pub fn parse_signature(header: &str) -> BillingResult<SignatureHeader> {
    let mut ts = None;
    let mut v1 = None;

    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim() {
            "ts" => ts = Some(value.trim().to_string()),
            "v1" => v1 = Some(value.trim().to_string()),
            _ => {}
        }
    }

    match (ts, v1) {
        (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok(SignatureHeader { ts, v1 }),
        _ => Err(BillingError::InvalidSignature(
            "header must contain ts and v1".into(),
        )),
    }
}

/// The string the gateway signs.
pub fn manifest(data_id: &str, request_id: &str, ts: &str) -> String {
    format!("id:{};request-id:{};ts:{};", data_id.to_lowercase(), request_id, ts)
}

/// Hex HMAC-SHA256 of `manifest` under `secret`.
pub fn sign(secret: &str, manifest: &str) -> BillingResult<String> {
    let mut mac = keyed(secret)?;
    mac.update(manifest.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn keyed(secret: &str) -> BillingResult<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BillingError::InvalidConfig(e.to_string()))
}

/// Checks the `x-signature` header against the notification.
///
/// The comparison runs in constant time.
pub fn verify(secret: &str, header: &str, request_id: &str, data_id: &str) -> BillingResult<()> {
    if secret.is_empty() {
        return Err(BillingError::NotConfigured);
    }

    let signature = parse_signature(header)?;
    let expected = hex::decode(&signature.v1)
        .map_err(|_| BillingError::InvalidSignature("v1 is not hex".into()))?;

    let mut mac = keyed(secret)?;
    mac.update(manifest(data_id, request_id, &signature.ts).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| BillingError::InvalidSignature("signature mismatch".into()))
}

// =============================================================================
// Notification Body
// =============================================================================

/// Payment notification posted by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    /// Topic, `payment` for payment events.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub action: Option<String>,
    pub data: NotificationData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl Notification {
    pub fn is_payment(&self) -> bool {
        self.kind == "payment"
    }
}

pub fn parse_notification(body: &[u8]) -> BillingResult<Notification> {
    serde_json::from_slice(body).map_err(|e| BillingError::InvalidNotification(e.to_string()))
}

// Ids arrive as either "123" or 123.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "webhook-secret";

    fn header_for(data_id: &str, request_id: &str, ts: &str) -> String {
        let v1 = sign(SECRET, &manifest(data_id, request_id, ts)).unwrap();
        format!("ts={},v1={}", ts, v1)
    }

    #[test]
    fn test_parse_signature() {
        let parsed = parse_signature(" v1=abc , ts=1700000000 ").unwrap();
        assert_eq!(parsed.ts, "1700000000");
        assert_eq!(parsed.v1, "abc");

        assert!(parse_signature("ts=1").is_err());
        assert!(parse_signature("garbage").is_err());
        assert!(parse_signature("ts=,v1=abc").is_err());
    }

    #[test]
    fn test_manifest_format() {
        assert_eq!(
            manifest("ABC123", "req-1", "99"),
            "id:abc123;request-id:req-1;ts:99;"
        );
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let header = header_for("123456", "req-1", "1742505638683");
        assert!(verify(SECRET, &header, "req-1", "123456").is_ok());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let header = header_for("123456", "req-1", "1742505638683");

        // Different payment id
        assert!(matches!(
            verify(SECRET, &header, "req-1", "999999"),
            Err(BillingError::InvalidSignature(_))
        ));
        // Different request id
        assert!(verify(SECRET, &header, "req-2", "123456").is_err());
        // Different secret
        assert!(verify("other", &header, "req-1", "123456").is_err());
        // Not hex
        assert!(verify(SECRET, "ts=1,v1=zz", "req-1", "123456").is_err());
    }

    #[test]
    fn test_verify_requires_secret() {
        let header = header_for("1", "r", "2");
        assert!(matches!(
            verify("", &header, "r", "1"),
            Err(BillingError::NotConfigured)
        ));
    }

    #[test]
    fn test_parse_notification_id_forms() {
        let text = parse_notification(br#"{"type":"payment","data":{"id":"42"}}"#).unwrap();
        assert_eq!(text.data.id, "42");
        assert!(text.is_payment());

        let number = parse_notification(
            br#"{"type":"payment","action":"payment.created","data":{"id":42}}"#,
        )
        .unwrap();
        assert_eq!(number.data.id, "42");
        assert_eq!(number.action.as_deref(), Some("payment.created"));

        let other = parse_notification(br#"{"type":"plan","data":{"id":"7"}}"#).unwrap();
        assert!(!other.is_payment());

        assert!(parse_notification(b"{}").is_err());
        assert!(parse_notification(br#"{"data":{"id":true}}"#).is_err());
    }
}
