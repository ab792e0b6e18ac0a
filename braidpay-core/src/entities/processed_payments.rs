//! Store of payment ids whose webhooks have already been acted on.
//!
//! Providers retry deliveries, so the same `paymentID` can arrive several
//! times. Hosts inject a store and wrap their handler in
//! [`Idempotent`](crate::processors::Idempotent) to credit each payment once.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Payment-id bookkeeping used for webhook deduplication.
///
/// `claim` must be atomic: of any number of concurrent claims for one id,
/// exactly one returns `true`.
#[async_trait]
pub trait ProcessedPayments: Send + Sync {
    /// Whether the id is claimed, either in flight or done.
    async fn has_processed(&self, payment_id: &str) -> anyhow::Result<bool>;

    /// Record the id, returning `false` if it was already claimed.
    async fn claim(&self, payment_id: &str) -> anyhow::Result<bool>;

    /// Forget a claim whose handler run did not succeed.
    async fn release(&self, payment_id: &str) -> anyhow::Result<()>;
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryProcessedPayments {
    ids: RwLock<HashSet<String>>,
}

impl MemoryProcessedPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.ids.read().await.len()
    }
}

#[async_trait]
impl ProcessedPayments for MemoryProcessedPayments {
    async fn has_processed(&self, payment_id: &str) -> anyhow::Result<bool> {
        Ok(self.ids.read().await.contains(payment_id))
    }

    async fn claim(&self, payment_id: &str) -> anyhow::Result<bool> {
        Ok(self.ids.write().await.insert(payment_id.to_owned()))
    }

    async fn release(&self, payment_id: &str) -> anyhow::Result<()> {
        self.ids.write().await.remove(payment_id);
        Ok(())
    }
}

#[async_trait]
impl<S: ProcessedPayments + ?Sized> ProcessedPayments for std::sync::Arc<S> {
    async fn has_processed(&self, payment_id: &str) -> anyhow::Result<bool> {
        (**self).has_processed(payment_id).await
    }

    async fn claim(&self, payment_id: &str) -> anyhow::Result<bool> {
        (**self).claim(payment_id).await
    }

    async fn release(&self, payment_id: &str) -> anyhow::Result<()> {
        (**self).release(payment_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[tokio::test]
    async fn claims_are_remembered() {
        let store = MemoryProcessedPayments::new();
        assert!(!store.has_processed("pay-1").await.unwrap());

        assert!(store.claim("pay-1").await.unwrap());
        assert!(!store.claim("pay-1").await.unwrap());

        assert!(store.has_processed("pay-1").await.unwrap());
        assert!(!store.has_processed("pay-2").await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn released_claim_can_be_retaken() {
        let store = MemoryProcessedPayments::new();
        assert!(store.claim("pay-1").await.unwrap());
        store.release("pay-1").await.unwrap();
        assert!(!store.has_processed("pay-1").await.unwrap());
        assert!(store.claim("pay-1").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryProcessedPayments::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.claim("pay-1").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
