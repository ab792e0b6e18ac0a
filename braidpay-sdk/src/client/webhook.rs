//! Webhook signature verification helper.
//!
//! Convenience wrapper for hosts that receive the raw request and want the
//! parsed, authenticated payload in one call.

use crate::objects::WebhookPayload;
use crate::signature::{SignatureError, verify_signature};

/// Parse and verify an incoming BraidPay webhook.
///
/// * `signature_header` – value of the `X-Webhook-Signature` request header.
/// * `body` – raw JSON request body string.
/// * `secret` – the webhook secret shared with the provider.
///
/// Returns the deserialized payload when the signature matches.
///
/// # Example
///
/// ```ignore
/// use braidpay_sdk::client::verify_webhook;
///
/// let payload = verify_webhook(signature_header, &body, webhook_secret)?;
/// ```
pub fn verify_webhook(
    signature_header: &str,
    body: &str,
    secret: &[u8],
) -> Result<WebhookPayload, SignatureError> {
    let payload: WebhookPayload = serde_json::from_str(body)?;
    if !verify_signature(secret, &payload.to_address, payload.amount, signature_header.trim()) {
        return Err(SignatureError::SignatureMismatch);
    }
    Ok(payload)
}
