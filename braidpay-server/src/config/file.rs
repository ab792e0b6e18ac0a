//! TOML file configuration structures.
//!
//! These structs directly map to the `braidpay-config.toml` file format.

use braidpay_core::config::PaymentBookConfig;
use braidpay_sdk::signature::DEFAULT_TIMESTAMP_TOLERANCE;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Webhook configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret from the BraidPay dashboard. `BRAIDPAY_WEBHOOK_SECRET`
    /// takes precedence.
    #[serde(default)]
    pub secret: Option<String>,
    /// Accepted skew of `X-Webhook-Timestamp`, in seconds.
    #[serde(default = "default_timestamp_tolerance")]
    pub timestamp_tolerance_secs: u64,
    #[serde(default)]
    pub handler_timeout_secs: Option<u64>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            timestamp_tolerance_secs: default_timestamp_tolerance(),
            handler_timeout_secs: None,
        }
    }
}

fn default_timestamp_tolerance() -> u64 {
    DEFAULT_TIMESTAMP_TOLERANCE.unsigned_abs()
}

/// Payment book limits. Changes take effect after restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Seconds an unconfirmed `register` call is remembered.
    #[serde(default = "default_registration_ttl")]
    pub registration_ttl_secs: u64,
    #[serde(default = "default_max_registrations")]
    pub max_registrations: usize,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            registration_ttl_secs: default_registration_ttl(),
            max_registrations: default_max_registrations(),
        }
    }
}

fn default_registration_ttl() -> u64 {
    PaymentBookConfig::DEFAULT_REGISTRATION_TTL.as_secs()
}

fn default_max_registrations() -> usize {
    PaymentBookConfig::DEFAULT_MAX_REGISTRATIONS
}
