//! Host callbacks invoked after a webhook passes verification.

use std::sync::Arc;

use async_trait::async_trait;
use braidpay_sdk::objects::WebhookPayload;
use tracing::{debug, warn};

use super::webhook::WebhookError;
use crate::entities::ProcessedPayments;

/// Business logic run for verified webhooks.
///
/// Every method has a no-op default, so a host only overrides the statuses it
/// cares about. Returning an error from `on_completed` or `on_pending` turns
/// the delivery into a failed [`VerificationResult`], which makes the
/// provider retry.
///
/// [`VerificationResult`]: braidpay_sdk::objects::VerificationResult
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn on_completed(&self, _payload: &WebhookPayload) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_pending(&self, _payload: &WebhookPayload) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once with the failure of `on_completed` or `on_pending`.
    fn on_error(&self, _error: &WebhookError) {}
}

#[async_trait]
impl<H: WebhookHandler + ?Sized> WebhookHandler for Arc<H> {
    async fn on_completed(&self, payload: &WebhookPayload) -> anyhow::Result<()> {
        (**self).on_completed(payload).await
    }

    async fn on_pending(&self, payload: &WebhookPayload) -> anyhow::Result<()> {
        (**self).on_pending(payload).await
    }

    fn on_error(&self, error: &WebhookError) {
        (**self).on_error(error)
    }
}

/// Handler wrapper that acts on each `paymentID` at most once.
///
/// The id is claimed before `on_completed` runs, so concurrent deliveries of
/// one payment reach the inner handler once. The claim is released when the
/// run fails, panics or is cancelled by the dispatch timeout, and the next
/// delivery retries. Once claimed, both `COMPLETED` and `PENDING` deliveries
/// for that id are acknowledged without reaching the inner handler.
pub struct Idempotent<H, S> {
    inner: H,
    store: Arc<S>,
}

impl<H, S> Idempotent<H, S> {
    pub fn new(inner: H, store: S) -> Self {
        Self {
            inner,
            store: Arc::new(store),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Releases a claim unless disarmed.
///
/// Dropping an armed guard (on panic or cancellation) releases from a spawned
/// task, since `Drop` cannot await.
struct Claim<S: ProcessedPayments + 'static> {
    store: Arc<S>,
    payment_id: Option<String>,
}

impl<S: ProcessedPayments + 'static> Claim<S> {
    fn keep(mut self) {
        self.payment_id = None;
    }

    async fn release(mut self) -> anyhow::Result<()> {
        match self.payment_id.take() {
            Some(payment_id) => self.store.release(&payment_id).await,
            None => Ok(()),
        }
    }
}

impl<S: ProcessedPayments + 'static> Drop for Claim<S> {
    fn drop(&mut self) {
        let Some(payment_id) = self.payment_id.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%payment_id, "No runtime to release abandoned payment claim");
            return;
        };
        let store = self.store.clone();
        runtime.spawn(async move {
            if let Err(e) = store.release(&payment_id).await {
                warn!(%payment_id, error = %e, "Failed to release abandoned payment claim");
            }
        });
    }
}

#[async_trait]
impl<H, S> WebhookHandler for Idempotent<H, S>
where
    H: WebhookHandler,
    S: ProcessedPayments + 'static,
{
    async fn on_completed(&self, payload: &WebhookPayload) -> anyhow::Result<()> {
        if !self.store.claim(&payload.payment_id).await? {
            debug!(payment_id = %payload.payment_id, "Payment already processed, skipping");
            return Ok(());
        }
        let claim = Claim {
            store: self.store.clone(),
            payment_id: Some(payload.payment_id.clone()),
        };

        match self.inner.on_completed(payload).await {
            Ok(()) => {
                claim.keep();
                Ok(())
            }
            Err(e) => {
                if let Err(release) = claim.release().await {
                    warn!(
                        payment_id = %payload.payment_id,
                        error = %release,
                        "Failed to release payment claim"
                    );
                }
                Err(e)
            }
        }
    }

    async fn on_pending(&self, payload: &WebhookPayload) -> anyhow::Result<()> {
        if self.store.has_processed(&payload.payment_id).await? {
            debug!(payment_id = %payload.payment_id, "Payment already processed, skipping");
            return Ok(());
        }
        self.inner.on_pending(payload).await
    }

    fn on_error(&self, error: &WebhookError) {
        self.inner.on_error(error)
    }
}
