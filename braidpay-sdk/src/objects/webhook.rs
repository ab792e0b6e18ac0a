//! Webhook payload types for payment-link status notifications.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::blockchains::{Network, Token};

/// A payment status notification as delivered by the provider.
///
/// Fields the provider adds beyond the known set are kept in `extra` so the
/// payload re-serializes without loss.  None of them are covered by the
/// signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "paymentLinkID")]
    pub payment_link_id: String,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    #[serde(rename = "fromAddress")]
    pub from_address: String,
    #[serde(rename = "toAddress")]
    pub to_address: String,
    pub hash: String,
    pub network: Network,
    pub token: Token,
    /// Always a JSON number on the wire. String amounts are rejected because
    /// their spelling (`"10.50"`) would not match the signed rendering.
    #[serde(
        serialize_with = "rust_decimal::serde::float::serialize",
        deserialize_with = "amount_from_number"
    )]
    pub amount: Decimal,
    pub status: WebhookStatus,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
    #[serde(
        rename = "Payer_Email",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payer_email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WebhookPayload {
    /// Payer email lower-cased, if the provider sent one.
    pub fn normalized_payer_email(&self) -> Option<String> {
        self.payer_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase)
    }
}

/// Parse a JSON number through its shortest decimal spelling, which is the
/// digit sequence JavaScript would sign.
fn amount_from_number<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = number.as_u64() {
        return Ok(Decimal::from(n));
    }
    if let Some(n) = number.as_i64() {
        return Ok(Decimal::from(n));
    }
    let float = number
        .as_f64()
        .ok_or_else(|| D::Error::custom("amount is not a finite number"))?;
    float
        .to_string()
        .parse::<Decimal>()
        .map_err(|e| D::Error::custom(format!("amount {float} out of range: {e}")))
}

/// Payment status carried by a webhook.
///
/// Statuses other than `PENDING` and `COMPLETED` are preserved verbatim in
/// [`WebhookStatus::Other`] and are never dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WebhookStatus {
    Pending,
    Completed,
    Other(String),
}

impl From<String> for WebhookStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => WebhookStatus::Pending,
            "COMPLETED" => WebhookStatus::Completed,
            _ => WebhookStatus::Other(value),
        }
    }
}

impl From<WebhookStatus> for String {
    fn from(value: WebhookStatus) -> Self {
        match value {
            WebhookStatus::Pending => "PENDING".to_string(),
            WebhookStatus::Completed => "COMPLETED".to_string(),
            WebhookStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookStatus::Pending => write!(f, "PENDING"),
            WebhookStatus::Completed => write!(f, "COMPLETED"),
            WebhookStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Outcome of verifying and dispatching one webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SAMPLE: &str = r#"{
        "paymentLinkID": "pl_123",
        "paymentID": "pay_456",
        "fromAddress": "0xFROM",
        "toAddress": "0xABC",
        "hash": "0xdeadbeef",
        "network": "BASE",
        "token": "USDC",
        "amount": 10.5,
        "status": "COMPLETED",
        "createdAt": "2024-05-01T12:00:00Z",
        "updatedAt": "2024-05-01T12:01:30Z",
        "Payer_Email": "Buyer@Example.com",
        "memo": "order #42",
        "confirmations": 12
    }"#;

    #[test]
    fn test_parse_full_payload() {
        let payload: WebhookPayload = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(payload.payment_link_id, "pl_123");
        assert_eq!(payload.payment_id, "pay_456");
        assert_eq!(payload.network, Network::Base);
        assert_eq!(payload.token, Token::Usdc);
        assert_eq!(payload.amount, Decimal::from_str("10.5").unwrap());
        assert_eq!(payload.status, WebhookStatus::Completed);
        assert_eq!(payload.created_at.unix_timestamp(), 1_714_564_800);
        assert_eq!(
            payload.normalized_payer_email().as_deref(),
            Some("buyer@example.com")
        );
        assert_eq!(payload.extra.len(), 2);
        assert_eq!(payload.extra["memo"], "order #42");
    }

    #[test]
    fn test_extra_fields_survive_reserialization() {
        let payload: WebhookPayload = serde_json::from_str(SAMPLE).unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["memo"], "order #42");
        assert_eq!(value["confirmations"], 12);
        assert_eq!(value["status"], "COMPLETED");
        assert_eq!(value["Payer_Email"], "Buyer@Example.com");

        let reparsed: WebhookPayload = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed, payload);
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let json = SAMPLE.replace("\"COMPLETED\"", "\"REFUNDED\"");
        let payload: WebhookPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload.status, WebhookStatus::Other("REFUNDED".to_string()));
        assert_eq!(serde_json::to_value(&payload).unwrap()["status"], "REFUNDED");
    }

    #[test]
    fn test_integer_amount_is_accepted() {
        let json = SAMPLE.replace("10.5", "10");
        let payload: WebhookPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload.amount, Decimal::from(10));
    }

    #[test]
    fn test_string_amount_is_rejected() {
        let json = SAMPLE.replace("10.5", "\"10.50\"");
        assert!(serde_json::from_str::<WebhookPayload>(&json).is_err());
    }

    #[test]
    fn test_tiny_amount_keeps_its_digits() {
        let json = SAMPLE.replace("10.5", "1e-7");
        let payload: WebhookPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload.amount, Decimal::from_str("0.0000001").unwrap());
        assert_eq!(
            crate::signature::signing_message(&payload.to_address, payload.amount),
            format!("{}1e-7", payload.to_address)
        );
    }

    #[test]
    fn test_missing_email_is_none() {
        let json = SAMPLE.replace("\"Payer_Email\": \"Buyer@Example.com\",", "");
        let payload: WebhookPayload = serde_json::from_str(&json).unwrap();
        assert!(payload.payer_email.is_none());
        assert!(payload.normalized_payer_email().is_none());
    }

    #[test]
    fn test_verification_result_serialization() {
        assert_eq!(
            serde_json::to_value(VerificationResult::ok()).unwrap(),
            serde_json::json!({"success": true})
        );
        assert_eq!(
            serde_json::to_value(VerificationResult::failed("Invalid signature")).unwrap(),
            serde_json::json!({"success": false, "error": "Invalid signature"})
        );
    }
}
