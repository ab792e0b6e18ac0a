//! HTTP client and status poller for the host verification endpoint.
//!
//! Gated behind the `client` cargo feature so server-side crates that only
//! need the shared types and signature code do not pull in `reqwest`.

mod poller;
mod status;
mod webhook;

pub use poller::{
    CompletionHook, PaymentPoller, PollerError, PollerOptions, PollerState, StatusWatcher,
    DEFAULT_POLLING_INTERVAL, DEFAULT_VERIFICATION_ENDPOINT,
};
pub use status::{StatusClient, StatusSource};
pub use webhook::verify_webhook;

use reqwest::StatusCode;

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint could not be resolved against the base URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
