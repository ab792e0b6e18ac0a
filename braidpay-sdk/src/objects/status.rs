//! Status endpoint request and response types.
//!
//! The host application exposes a verification endpoint that the browser
//! side polls.  It answers from records the host persisted out of webhook
//! callbacks, so the browser learns about completion without a direct
//! channel to the webhook.

use serde::{Deserialize, Serialize};

/// Body of a `POST` to the verification endpoint.
///
/// `action` is `Some("register")` for the one-off registration call and
/// absent for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheckRequest {
    #[serde(rename = "paymentLinkID")]
    pub payment_link_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<StatusAction>,
}

impl StatusCheckRequest {
    pub fn query(payment_link_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            payment_link_id: payment_link_id.into(),
            email: email.into(),
            action: None,
        }
    }

    pub fn register(payment_link_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            action: Some(StatusAction::Register),
            ..Self::query(payment_link_id, email)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAction {
    Register,
}

/// Response body of the verification endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCheckResponse {
    pub success: bool,
    #[serde(rename = "isPending", default)]
    pub is_pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StatusCheckResponse {
    /// Nothing is known yet about the payment.
    pub fn awaiting() -> Self {
        Self {
            success: false,
            is_pending: true,
            ..Default::default()
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Client-visible payment status.
///
/// `should_show_success` is always `success && !is_pending`; use the
/// constructors rather than building the struct by hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub success: bool,
    #[serde(rename = "isPending")]
    pub is_pending: bool,
    #[serde(rename = "shouldShowSuccess")]
    pub should_show_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl PaymentStatus {
    /// Registration accepted, waiting for the first poll.
    pub fn awaiting() -> Self {
        Self {
            is_pending: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Build the status published for one poll response.  The raw response
    /// is kept in `data`.
    pub fn from_response(response: StatusCheckResponse) -> Self {
        let success = response.success;
        let is_pending = response.is_pending;
        let error = response.error.clone();
        let data = serde_json::to_value(&response).ok();
        Self {
            success,
            is_pending,
            should_show_success: success && !is_pending,
            error,
            data,
        }
    }

    /// Whether this status ends a polling session.
    pub fn is_complete(&self) -> bool {
        self.success && !self.is_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        assert_eq!(
            serde_json::to_value(StatusCheckRequest::query("pl_1", "a@b.io")).unwrap(),
            serde_json::json!({"paymentLinkID": "pl_1", "email": "a@b.io"})
        );
        assert_eq!(
            serde_json::to_value(StatusCheckRequest::register("pl_1", "a@b.io")).unwrap(),
            serde_json::json!({"paymentLinkID": "pl_1", "email": "a@b.io", "action": "register"})
        );
    }

    #[test]
    fn test_response_defaults_is_pending() {
        let response: StatusCheckResponse =
            serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(response.success);
        assert!(!response.is_pending);
        assert!(PaymentStatus::from_response(response).is_complete());
    }

    #[test]
    fn test_should_show_success_derivation() {
        let cases = [
            (false, false, false),
            (false, true, false),
            (true, true, false),
            (true, false, true),
        ];
        for (success, is_pending, expected) in cases {
            let status = PaymentStatus::from_response(StatusCheckResponse {
                success,
                is_pending,
                ..Default::default()
            });
            assert_eq!(status.should_show_success, expected);
            assert_eq!(status.is_complete(), expected);
        }
    }

    #[test]
    fn test_from_response_keeps_raw_data() {
        let response: StatusCheckResponse = serde_json::from_str(
            r#"{"success": true, "isPending": false, "data": {"paymentID": "pay_1"}}"#,
        )
        .unwrap();
        let status = PaymentStatus::from_response(response);
        let data = status.data.unwrap();
        assert_eq!(data["data"]["paymentID"], "pay_1");
        assert_eq!(data["success"], true);
    }

    #[test]
    fn test_initial_and_awaiting_status() {
        let initial = PaymentStatus::default();
        assert!(!initial.success && !initial.is_pending && !initial.should_show_success);

        let awaiting = PaymentStatus::awaiting();
        assert!(awaiting.is_pending);
        assert!(!awaiting.should_show_success);
        assert!(awaiting.error.is_none());
    }
}
