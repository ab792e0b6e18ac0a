//! Webhook verification and dispatch.
//!
//! The processor checks the HMAC signature (and the send timestamp, when the
//! provider supplied one), then routes the payload by status to the host's
//! [`WebhookHandler`]. Every outcome, including handler errors, panics and
//! timeouts, is folded into a [`VerificationResult`].

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use braidpay_sdk::objects::{VerificationResult, WebhookPayload, WebhookStatus};
use braidpay_sdk::signature::{self, DEFAULT_TIMESTAMP_TOLERANCE};
use futures_util::FutureExt;
use kanau::processor::Processor;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::handlers::WebhookHandler;
use crate::config::WebhookConfig;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,

    #[error("{0:#}")]
    HandlerFailed(anyhow::Error),

    #[error("Webhook handler timed out after {0:?}")]
    HandlerTimeout(Duration),

    #[error("Webhook handler panicked: {0}")]
    HandlerPanicked(String),
}

/// A parsed webhook delivery together with its authentication headers.
#[derive(Debug, Clone)]
pub struct IncomingWebhook {
    pub payload: WebhookPayload,
    /// Value of the `X-Webhook-Signature` header.
    pub signature: String,
    /// Value of the `X-Webhook-Timestamp` header, if sent.
    pub timestamp: Option<i64>,
}

impl IncomingWebhook {
    pub fn new(payload: WebhookPayload, signature: impl Into<String>) -> Self {
        Self {
            payload,
            signature: signature.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Verifies webhooks against a shared secret and dispatches them to `H`.
///
/// Holds no mutable state; one instance can serve concurrent deliveries.
pub struct WebhookProcessor<H> {
    secret: Box<[u8]>,
    timestamp_tolerance: i64,
    handler_timeout: Option<Duration>,
    handler: H,
}

impl<H: WebhookHandler> WebhookProcessor<H> {
    pub fn new(secret: impl Into<Box<[u8]>>, handler: H) -> Self {
        Self {
            secret: secret.into(),
            timestamp_tolerance: DEFAULT_TIMESTAMP_TOLERANCE,
            handler_timeout: None,
            handler,
        }
    }

    /// Build a processor from runtime config.
    ///
    /// Returns `None` when no secret is configured.
    pub fn from_config(config: &WebhookConfig, handler: H) -> Option<Self> {
        let secret = config.secret_bytes()?;
        let mut processor = Self::new(secret, handler)
            .with_timestamp_tolerance(config.timestamp_tolerance);
        processor.handler_timeout = config.handler_timeout;
        Some(processor)
    }

    pub fn with_timestamp_tolerance(mut self, seconds: i64) -> Self {
        self.timestamp_tolerance = seconds;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Verify and dispatch a webhook that carries no timestamp header.
    pub async fn process_webhook(&self, payload: WebhookPayload, signature: &str) -> VerificationResult {
        match self.process(IncomingWebhook::new(payload, signature)).await {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    fn verify(&self, webhook: &IncomingWebhook, now: i64) -> Result<(), WebhookError> {
        if let Some(timestamp) = webhook.timestamp {
            if signature::check_timestamp(timestamp, self.timestamp_tolerance, now).is_err() {
                warn!(timestamp, now, "Webhook timestamp outside tolerance");
                return Err(WebhookError::StaleTimestamp);
            }
        }
        let payload = &webhook.payload;
        if !signature::verify_signature(&self.secret, &payload.to_address, payload.amount, &webhook.signature) {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    async fn dispatch(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let call = match &payload.status {
            WebhookStatus::Completed => self.handler.on_completed(payload),
            WebhookStatus::Pending => self.handler.on_pending(payload),
            WebhookStatus::Other(status) => {
                debug!(status = %status, "No handler for webhook status, accepting");
                return Ok(());
            }
        };

        let guarded = AssertUnwindSafe(call).catch_unwind();
        let outcome = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| WebhookError::HandlerTimeout(limit))?,
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WebhookError::HandlerFailed(e)),
            Err(panic) => Err(WebhookError::HandlerPanicked(panic_message(panic.as_ref()))),
        }
    }

    fn report(&self, error: &WebhookError) {
        let handler = &self.handler;
        if std::panic::catch_unwind(AssertUnwindSafe(|| handler.on_error(error))).is_err() {
            error!("Webhook error handler panicked");
        }
    }
}

impl<H: WebhookHandler> Processor<IncomingWebhook> for WebhookProcessor<H> {
    type Output = VerificationResult;
    type Error = Infallible;
    #[tracing::instrument(
        skip_all,
        name = "Webhook:Process",
        fields(payment_id = %webhook.payload.payment_id, status = %webhook.payload.status)
    )]
    async fn process(&self, webhook: IncomingWebhook) -> Result<VerificationResult, Infallible> {
        if let Err(e) = self.verify(&webhook, signature::unix_now()) {
            warn!(error = %e, "Rejected webhook");
            return Ok(VerificationResult::failed(e.to_string()));
        }

        match self.dispatch(&webhook.payload).await {
            Ok(()) => {
                info!("Webhook processed");
                Ok(VerificationResult::ok())
            }
            Err(e) => {
                error!(error = %e, "Webhook handler failed");
                self.report(&e);
                Ok(VerificationResult::failed(e.to_string()))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
