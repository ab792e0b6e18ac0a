//! Messages posted by the embedded checkout frame.
//!
//! The checkout page may `postMessage` a completion notice to the embedding
//! window.  A message is only trusted when it comes from the origin of the
//! payment link the frame was opened with.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

/// `{"type": "payment_complete", ...}` posted by the checkout frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompleteMessage {
    #[serde(rename = "type")]
    pub kind: FrameMessageKind,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    pub status: FrameOutcome,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameMessageKind {
    PaymentComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOutcome {
    Success,
    Failed,
}

impl PaymentCompleteMessage {
    /// Accept `data` only if `origin` matches the payment link's origin and
    /// the message is a well-formed completion notice.
    pub fn from_frame(payment_link: &Url, origin: &str, data: &serde_json::Value) -> Option<Self> {
        let expected = payment_link.origin();
        if !expected.is_tuple() || expected.ascii_serialization() != origin {
            tracing::debug!(%origin, "Ignoring frame message from foreign origin");
            return None;
        }
        serde_json::from_value(data.clone()).ok()
    }
}
