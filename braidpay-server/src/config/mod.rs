//! Configuration module for braidpay-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{PaymentBookConfig, ServerConfig, SharedConfig, WebhookConfig};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    /// Fixed for the life of the process; not part of [`SharedConfig`].
    pub payments: PaymentBookConfig,
}

impl LoadedConfig {
    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig::new(self.server, self.webhook)
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
    secret_override: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    ///
    /// `secret_override` carries `BRAIDPAY_WEBHOOK_SECRET` (or `--webhook-secret`)
    /// and wins over the file's `webhook.secret`.
    pub fn new(
        config_path: impl AsRef<Path>,
        listen_override: Option<SocketAddr>,
        secret_override: Option<String>,
    ) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
            secret_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file (a missing file yields the defaults)
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.config_path.display(),
                    "Config file not found, using defaults"
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(secret) = &self.secret_override {
            file_config.webhook.secret = Some(secret.clone());
        }

        self.validate(&file_config)?;

        if file_config.webhook.secret.is_none() {
            tracing::warn!("No webhook secret configured; webhooks will be refused");
        }

        Ok(build_loaded_config(file_config))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if let Some(secret) = &config.webhook.secret {
            if secret.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "webhook secret must not be empty".to_string(),
                ));
            }
        }
        if config.webhook.timestamp_tolerance_secs == 0 {
            return Err(ConfigError::ValidationError(
                "webhook timestamp_tolerance_secs must be positive".to_string(),
            ));
        }
        if i64::try_from(config.webhook.timestamp_tolerance_secs).is_err() {
            return Err(ConfigError::ValidationError(
                "webhook timestamp_tolerance_secs is too large".to_string(),
            ));
        }
        if config.webhook.handler_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "webhook handler_timeout_secs must be positive".to_string(),
            ));
        }
        if config.payments.registration_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "payments registration_ttl_secs must be positive".to_string(),
            ));
        }
        if config.payments.max_registrations == 0 {
            return Err(ConfigError::ValidationError(
                "payments max_registrations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let webhook = file_config.webhook;
    let payments = file_config.payments;
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        webhook: WebhookConfig {
            secret: webhook.secret.map(|s| s.into_bytes().into_boxed_slice()),
            timestamp_tolerance: i64::try_from(webhook.timestamp_tolerance_secs).unwrap_or(i64::MAX),
            handler_timeout: webhook.handler_timeout_secs.map(Duration::from_secs),
        },
        payments: PaymentBookConfig {
            registration_ttl: Duration::from_secs(payments.registration_ttl_secs),
            max_registrations: payments.max_registrations,
        },
    }
}
