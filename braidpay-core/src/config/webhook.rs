//! Webhook verification configuration.

use std::time::Duration;

use braidpay_sdk::signature::DEFAULT_TIMESTAMP_TOLERANCE;

/// Settings for verifying and dispatching provider webhooks.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Shared secret for HMAC verification. `None` means the deployment is
    /// not configured and every webhook must be refused.
    pub secret: Option<Box<[u8]>>,
    /// Accepted clock skew for timestamped notifications, in seconds.
    pub timestamp_tolerance: i64,
    /// Upper bound on a single handler call.
    pub handler_timeout: Option<Duration>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("timestamp_tolerance", &self.timestamp_tolerance)
            .field("handler_timeout", &self.handler_timeout)
            .finish()
    }
}

impl WebhookConfig {
    pub fn new(secret: Option<impl Into<Box<[u8]>>>) -> Self {
        Self {
            secret: secret.map(Into::into),
            timestamp_tolerance: DEFAULT_TIMESTAMP_TOLERANCE,
            handler_timeout: None,
        }
    }

    /// Get the secret key bytes, if configured.
    pub fn secret_bytes(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }
}
