//! Runtime configuration re-exports.
//!
//! The validated config types are defined in `braidpay-core::config`.

pub use braidpay_core::config::{PaymentBookConfig, ServerConfig, SharedConfig, WebhookConfig};
