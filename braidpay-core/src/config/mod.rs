//! Configuration types for the BraidPay host.
//!
//! These types represent the validated runtime configuration used by the server
//! and can be shared across crates. The actual config loading/parsing is handled
//! by the server crate.

mod payments;
mod server;
mod webhook;

pub use payments::PaymentBookConfig;
pub use server::ServerConfig;
pub use webhook::WebhookConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each section.
///
/// This allows independent access to different configuration sections
/// without blocking other readers/writers.
#[derive(Clone)]
pub struct SharedConfig {
    /// Server configuration (listen address, etc.).
    pub server: Arc<RwLock<ServerConfig>>,
    /// Webhook verification settings.
    pub webhook: Arc<RwLock<WebhookConfig>>,
}

impl SharedConfig {
    /// Create a new SharedConfig from individual configuration parts.
    pub fn new(server: ServerConfig, webhook: WebhookConfig) -> Self {
        Self {
            server: Arc::new(RwLock::new(server)),
            webhook: Arc::new(RwLock::new(webhook)),
        }
    }

    /// Get a read lock on the webhook configuration.
    pub async fn webhook(&self) -> tokio::sync::RwLockReadGuard<'_, WebhookConfig> {
        self.webhook.read().await
    }

    /// Update all configuration sections at once.
    pub async fn update_all(&self, server: ServerConfig, webhook: WebhookConfig) {
        // Update in sequence to avoid potential deadlocks
        *self.server.write().await = server;
        *self.webhook.write().await = webhook;
    }
}
