//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /api/braidpay-webhook`      – signed provider notifications
//! - `POST /api/check-payment-status`  – status polls from the checkout page

use axum::{Router, routing::post};
use serde::Serialize;

use crate::state::AppState;

pub mod extractors;
mod payment_status;
pub mod webhook;

/// Build the API router (mounted under `/api`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/braidpay-webhook", post(webhook::receive_webhook))
        .route(
            "/check-payment-status",
            post(payment_status::check_payment_status),
        )
}

/// `{ "error": "..." }` response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
