//! `POST /api/braidpay-webhook`: provider payment notifications.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use async_trait::async_trait;
use braidpay_core::entities::{PaymentBook, RecordWebhook};
use braidpay_core::processors::{WebhookError, WebhookHandler, WebhookProcessor};
use braidpay_sdk::objects::WebhookPayload;
use kanau::processor::Processor;
use serde::Serialize;

use super::ErrorBody;
use super::extractors::WebhookDelivery;
use crate::state::AppState;

/// Webhook handler that stores deliveries in the [`PaymentBook`].
pub struct BookRecorder {
    book: PaymentBook,
}

impl BookRecorder {
    pub fn new(book: PaymentBook) -> Self {
        Self { book }
    }

    async fn record(&self, payload: &WebhookPayload) -> anyhow::Result<()> {
        let Ok(progress) = self
            .book
            .process(RecordWebhook {
                payload: payload.clone(),
            })
            .await;
        tracing::info!(
            payment_id = %payload.payment_id,
            payment_link_id = %payload.payment_link_id,
            progress = ?progress,
            "Recorded webhook"
        );
        Ok(())
    }
}

#[async_trait]
impl WebhookHandler for BookRecorder {
    async fn on_completed(&self, payload: &WebhookPayload) -> anyhow::Result<()> {
        self.record(payload).await
    }

    async fn on_pending(&self, payload: &WebhookPayload) -> anyhow::Result<()> {
        self.record(payload).await
    }

    fn on_error(&self, error: &WebhookError) {
        tracing::error!(error = %error, "Webhook processing error");
    }
}

#[derive(Debug, Serialize)]
struct Received {
    received: bool,
}

/// Errors returned by the webhook endpoint after extraction.
#[derive(Debug)]
pub(super) enum WebhookApiError {
    /// No webhook secret is configured.
    Configuration,
    /// Verification or the handler failed.
    Rejected(String),
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            WebhookApiError::Configuration => {
                tracing::error!("Webhook secret not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new("Configuration error")),
                )
                    .into_response()
            }
            WebhookApiError::Rejected(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody::new(error))).into_response()
            }
        }
    }
}

/// `POST /api/braidpay-webhook`: receive a signed payment notification.
///
/// Verifies the signature against the configured secret, then records
/// `PENDING` and `COMPLETED` deliveries in the payment book.
pub(super) async fn receive_webhook(
    state: State<AppState>,
    delivery: WebhookDelivery,
) -> Result<impl IntoResponse, WebhookApiError> {
    let processor = {
        let config = state.config.webhook().await;
        WebhookProcessor::from_config(&config, state.handler.clone())
            .ok_or(WebhookApiError::Configuration)?
    };

    let Ok(result) = processor.process(delivery.into()).await;
    if !result.success {
        return Err(WebhookApiError::Rejected(
            result.error.unwrap_or_else(|| "Webhook rejected".to_string()),
        ));
    }
    Ok(Json(Received { received: true }))
}
