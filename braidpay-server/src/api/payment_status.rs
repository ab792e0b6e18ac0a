//! `POST /api/check-payment-status`: answers the checkout status poller.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use braidpay_core::entities::{GetPaymentRecord, PaymentKey, PaymentProgress, RegisterPayment};
use braidpay_sdk::email::is_valid_email;
use braidpay_sdk::objects::{StatusAction, StatusCheckResponse};
use kanau::processor::Processor;

use super::extractors::StatusQuery;
use crate::state::AppState;

#[derive(Debug)]
pub(super) enum StatusApiError {
    InvalidEmail,
    Serialize(serde_json::Error),
}

impl IntoResponse for StatusApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            StatusApiError::InvalidEmail => (
                StatusCode::BAD_REQUEST,
                Json(StatusCheckResponse::rejected("Invalid email format")),
            )
                .into_response(),
            StatusApiError::Serialize(e) => {
                tracing::error!(error = %e, "Failed to serialize payment record");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(StatusCheckResponse::rejected("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}

/// `POST /api/check-payment-status`: register or query a payment attempt.
///
/// With `action: "register"` the attempt is recorded and reported as
/// pending. Otherwise the answer comes from whatever webhooks have recorded
/// for `(paymentLinkID, email)`.
pub(super) async fn check_payment_status(
    state: State<AppState>,
    StatusQuery(request): StatusQuery,
) -> Result<impl IntoResponse, StatusApiError> {
    if !is_valid_email(&request.email) {
        return Err(StatusApiError::InvalidEmail);
    }
    let key = PaymentKey::new(request.payment_link_id, &request.email);

    if request.action == Some(StatusAction::Register) {
        // A refused registration answers the same: until a webhook arrives
        // the attempt reads as awaiting either way.
        let Ok(progress) = state.book.process(RegisterPayment { key }).await;
        tracing::debug!(progress = ?progress, "Payment attempt registered");
        return Ok(Json(StatusCheckResponse::awaiting()));
    }

    let Ok(record) = state.book.process(GetPaymentRecord { key }).await;
    let Some(record) = record else {
        return Ok(Json(StatusCheckResponse::awaiting()));
    };
    let data = record
        .payload
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(StatusApiError::Serialize)?;

    let response = match record.progress {
        PaymentProgress::Completed => StatusCheckResponse {
            success: true,
            is_pending: false,
            error: None,
            data,
        },
        PaymentProgress::Pending => StatusCheckResponse {
            success: true,
            is_pending: true,
            error: None,
            data,
        },
        PaymentProgress::Registered => StatusCheckResponse::awaiting(),
    };
    Ok(Json(response))
}
