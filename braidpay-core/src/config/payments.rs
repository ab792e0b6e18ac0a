//! Limits on the in-memory payment book.

use std::time::Duration;

/// Bounds on unconfirmed registrations kept by
/// [`PaymentBook`](crate::entities::PaymentBook).
///
/// Records moved by a webhook are never evicted by these limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentBookConfig {
    /// How long a registration without any webhook is kept.
    pub registration_ttl: Duration,
    /// Most registrations without any webhook held at once.
    pub max_registrations: usize,
}

impl PaymentBookConfig {
    pub const DEFAULT_REGISTRATION_TTL: Duration = Duration::from_secs(30 * 60);
    pub const DEFAULT_MAX_REGISTRATIONS: usize = 10_000;

    /// How often a sweeper should run for this TTL: a quarter of it, at
    /// least once a second.
    pub fn sweep_interval(&self) -> Duration {
        (self.registration_ttl / 4).max(Duration::from_secs(1))
    }
}

impl Default for PaymentBookConfig {
    fn default() -> Self {
        Self {
            registration_ttl: Self::DEFAULT_REGISTRATION_TTL,
            max_registrations: Self::DEFAULT_MAX_REGISTRATIONS,
        }
    }
}
