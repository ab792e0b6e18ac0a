//! Custom Axum extractors for incoming provider requests.
//!
//! Provides `WebhookDelivery`, which pulls the `X-Webhook-Signature` and
//! optional `X-Webhook-Timestamp` headers and parses the JSON body into a
//! [`WebhookPayload`]. The signature itself is checked later by the webhook
//! processor, once the secret is known.
//!
//! `StatusQuery` parses the checkout poller's JSON body and answers malformed
//! requests in the poller's own response shape.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use braidpay_core::processors::IncomingWebhook;
use braidpay_sdk::objects::{StatusCheckRequest, StatusCheckResponse, WebhookPayload};
use braidpay_sdk::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};

use super::ErrorBody;

/// Largest accepted webhook body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// A webhook request whose headers and body are well-formed.
#[derive(Debug)]
pub struct WebhookDelivery {
    pub payload: WebhookPayload,
    pub signature: String,
    pub timestamp: Option<i64>,
}

impl From<WebhookDelivery> for IncomingWebhook {
    fn from(delivery: WebhookDelivery) -> Self {
        IncomingWebhook {
            payload: delivery.payload,
            signature: delivery.signature,
            timestamp: delivery.timestamp,
        }
    }
}

/// Errors that can occur while extracting a webhook delivery.
#[derive(Debug, thiserror::Error)]
pub enum WebhookDeliveryError {
    #[error("missing X-Webhook-Signature header")]
    MissingSignature,
    #[error("invalid X-Webhook-Timestamp header")]
    InvalidTimestamp,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for WebhookDeliveryError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Rejected webhook request");
        let (status, message) = match self {
            WebhookDeliveryError::MissingSignature => (StatusCode::UNAUTHORIZED, "Missing signature"),
            WebhookDeliveryError::InvalidTimestamp => (StatusCode::BAD_REQUEST, "Invalid timestamp"),
            WebhookDeliveryError::BodyReadError | WebhookDeliveryError::InvalidPayload(_) => {
                (StatusCode::BAD_REQUEST, "Invalid payload")
            }
        };
        (status, Json(ErrorBody::new(message))).into_response()
    }
}

impl<S: Send + Sync> FromRequest<S> for WebhookDelivery {
    type Rejection = WebhookDeliveryError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers();
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(WebhookDeliveryError::MissingSignature)?
            .to_owned();

        let timestamp = match headers.get(TIMESTAMP_HEADER) {
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| WebhookDeliveryError::InvalidTimestamp)?;
                Some(
                    signature::parse_timestamp_header(value)
                        .map_err(|_| WebhookDeliveryError::InvalidTimestamp)?,
                )
            }
            None => None,
        };

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| WebhookDeliveryError::BodyReadError)?;

        let payload: WebhookPayload = serde_json::from_slice(&body_bytes)
            .map_err(|e| WebhookDeliveryError::InvalidPayload(e.to_string()))?;
        check_required_fields(&payload)?;

        Ok(WebhookDelivery {
            payload,
            signature,
            timestamp,
        })
    }
}

fn check_required_fields(payload: &WebhookPayload) -> Result<(), WebhookDeliveryError> {
    if payload.payment_id.is_empty() {
        return Err(WebhookDeliveryError::InvalidPayload("empty paymentID".to_string()));
    }
    if payload.to_address.is_empty() {
        return Err(WebhookDeliveryError::InvalidPayload("empty toAddress".to_string()));
    }
    if payload.amount.is_zero() {
        return Err(WebhookDeliveryError::InvalidPayload("zero amount".to_string()));
    }
    Ok(())
}

/// A status-check request body.
#[derive(Debug)]
pub struct StatusQuery(pub StatusCheckRequest);

/// A status-check body that is not JSON or lacks required fields.
#[derive(Debug)]
pub struct StatusQueryRejection(JsonRejection);

impl IntoResponse for StatusQueryRejection {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self.0.body_text(), "Rejected status check request");
        (
            StatusCode::BAD_REQUEST,
            Json(StatusCheckResponse::rejected("Invalid request body")),
        )
            .into_response()
    }
}

impl<S: Send + Sync> FromRequest<S> for StatusQuery {
    type Rejection = StatusQueryRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(request) = Json::<StatusCheckRequest>::from_request(req, state)
            .await
            .map_err(StatusQueryRejection)?;
        Ok(StatusQuery(request))
    }
}
