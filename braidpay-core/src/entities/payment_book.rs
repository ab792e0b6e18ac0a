//! In-memory record of payment attempts, fed by webhooks and read by the
//! status endpoint.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use braidpay_sdk::objects::{WebhookPayload, WebhookStatus};
use kanau::processor::Processor;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::config::PaymentBookConfig;

/// Key for one payment attempt: the payment link plus the payer's email,
/// lower-cased so lookups from the browser match webhook deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentKey {
    pub payment_link_id: String,
    pub email: String,
}

impl PaymentKey {
    pub fn new(payment_link_id: impl Into<String>, email: &str) -> Self {
        Self {
            payment_link_id: payment_link_id.into(),
            email: email.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentProgress {
    /// The browser announced the attempt; nothing heard from the provider.
    Registered,
    /// The provider reported the transfer as pending.
    Pending,
    /// The provider reported the transfer as completed.
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub progress: PaymentProgress,
    /// Last webhook payload received for this attempt.
    pub payload: Option<WebhookPayload>,
    pub updated_at: time::OffsetDateTime,
}

/// Payment attempts keyed by [`PaymentKey`].
///
/// Registrations nobody confirms expire after
/// [`PaymentBookConfig::registration_ttl`] and are capped at
/// [`PaymentBookConfig::max_registrations`]. Cloning is cheap; all clones
/// share the same map.
#[derive(Debug, Clone, Default)]
pub struct PaymentBook {
    records: Arc<RwLock<HashMap<PaymentKey, PaymentRecord>>>,
    limits: PaymentBookConfig,
}

impl PaymentBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(limits: PaymentBookConfig) -> Self {
        Self {
            records: Arc::default(),
            limits,
        }
    }

    pub fn limits(&self) -> &PaymentBookConfig {
        &self.limits
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Drop registrations older than the TTL, returning how many went.
fn evict_expired(
    records: &mut HashMap<PaymentKey, PaymentRecord>,
    limits: &PaymentBookConfig,
    now: OffsetDateTime,
) -> usize {
    let before = records.len();
    records.retain(|_, record| {
        record.progress != PaymentProgress::Registered
            || now - record.updated_at < limits.registration_ttl
    });
    before - records.len()
}

fn registered_count(records: &HashMap<PaymentKey, PaymentRecord>) -> usize {
    records
        .values()
        .filter(|record| record.progress == PaymentProgress::Registered)
        .count()
}

#[derive(Debug, Clone)]
/// Note that a payer started paying a link.
///
/// An existing webhook record is left untouched, so a late registration never
/// hides a webhook that already arrived. Re-registering refreshes an
/// unconfirmed registration's TTL.
pub struct RegisterPayment {
    pub key: PaymentKey,
}

impl Processor<RegisterPayment> for PaymentBook {
    /// The progress of the attempt, or `None` when the book is full of
    /// unconfirmed registrations.
    type Output = Option<PaymentProgress>;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Book:RegisterPayment")]
    async fn process(&self, insert: RegisterPayment) -> Result<Option<PaymentProgress>, Infallible> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&insert.key) {
            if record.progress == PaymentProgress::Registered {
                record.updated_at = now;
            }
            return Ok(Some(record.progress));
        }

        // Only webhook-free records count, so the full scan is skipped while
        // the whole book is under the cap.
        if records.len() >= self.limits.max_registrations
            && registered_count(&records) >= self.limits.max_registrations
        {
            let evicted = evict_expired(&mut records, &self.limits, now);
            if registered_count(&records) >= self.limits.max_registrations {
                tracing::warn!(
                    evicted,
                    max = self.limits.max_registrations,
                    "Too many unconfirmed registrations, not recorded"
                );
                return Ok(None);
            }
        }

        records.insert(
            insert.key,
            PaymentRecord {
                progress: PaymentProgress::Registered,
                payload: None,
                updated_at: now,
            },
        );
        Ok(Some(PaymentProgress::Registered))
    }
}

#[derive(Debug, Clone, Copy)]
/// Evict registrations that saw no webhook within the TTL, as of `now`.
pub struct SweepRegistrations {
    pub now: OffsetDateTime,
}

impl Processor<SweepRegistrations> for PaymentBook {
    /// Number of registrations evicted.
    type Output = usize;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Book:SweepRegistrations")]
    async fn process(&self, sweep: SweepRegistrations) -> Result<usize, Infallible> {
        let mut records = self.records.write().await;
        let evicted = evict_expired(&mut records, &self.limits, sweep.now);
        if evicted > 0 {
            tracing::debug!(evicted, remaining = records.len(), "Expired registrations evicted");
        }
        Ok(evicted)
    }
}

#[derive(Debug, Clone)]
/// Store a webhook delivery against its payment attempt.
///
/// Only `PENDING` and `COMPLETED` move the record. A completed record is
/// never downgraded by a late `PENDING` delivery. Payloads without a payer
/// email cannot be keyed and are skipped.
pub struct RecordWebhook {
    pub payload: WebhookPayload,
}

impl Processor<RecordWebhook> for PaymentBook {
    /// The progress after recording, or `None` when the payload was skipped.
    type Output = Option<PaymentProgress>;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Book:RecordWebhook")]
    async fn process(&self, update: RecordWebhook) -> Result<Option<PaymentProgress>, Infallible> {
        let payload = update.payload;
        let progress = match payload.status {
            WebhookStatus::Completed => PaymentProgress::Completed,
            WebhookStatus::Pending => PaymentProgress::Pending,
            WebhookStatus::Other(_) => return Ok(None),
        };
        let Some(email) = payload.normalized_payer_email() else {
            tracing::warn!(
                payment_id = %payload.payment_id,
                "Webhook carries no payer email, not recorded"
            );
            return Ok(None);
        };
        let key = PaymentKey {
            payment_link_id: payload.payment_link_id.clone(),
            email,
        };

        let mut records = self.records.write().await;
        let now = OffsetDateTime::now_utc();
        let record = records.entry(key).or_insert_with(|| PaymentRecord {
            progress: PaymentProgress::Registered,
            payload: None,
            updated_at: now,
        });
        if record.progress == PaymentProgress::Completed && progress != PaymentProgress::Completed {
            tracing::debug!(
                payment_id = %payload.payment_id,
                "Ignoring pending delivery for a completed payment"
            );
            return Ok(Some(record.progress));
        }
        record.progress = progress;
        record.payload = Some(payload);
        record.updated_at = now;
        Ok(Some(progress))
    }
}

#[derive(Debug, Clone)]
/// Fetch the current record for a payment attempt.
pub struct GetPaymentRecord {
    pub key: PaymentKey,
}

impl Processor<GetPaymentRecord> for PaymentBook {
    type Output = Option<PaymentRecord>;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Book:GetPaymentRecord")]
    async fn process(&self, query: GetPaymentRecord) -> Result<Option<PaymentRecord>, Infallible> {
        Ok(self.records.read().await.get(&query.key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn payload(status: &str, email: Option<&str>) -> WebhookPayload {
        let mut value = serde_json::json!({
            "paymentLinkID": "link-1",
            "paymentID": "pay-1",
            "fromAddress": "0xFROM",
            "toAddress": "0xABC",
            "hash": "0xHASH",
            "network": "POLYGON",
            "token": "USDC",
            "amount": 10,
            "status": status,
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-01T12:00:05Z"
        });
        if let Some(email) = email {
            value["Payer_Email"] = serde_json::Value::from(email);
        }
        serde_json::from_value(value).unwrap()
    }

    fn key() -> PaymentKey {
        PaymentKey::new("link-1", "payer@example.com")
    }

    #[test]
    fn key_lowercases_email() {
        let key = PaymentKey::new("link-1", "  Payer@Example.COM ");
        assert_eq!(key.email, "payer@example.com");
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let book = PaymentBook::new();
        let progress = book.process(RegisterPayment { key: key() }).await.unwrap();
        assert_eq!(progress, Some(PaymentProgress::Registered));

        let record = book.process(GetPaymentRecord { key: key() }).await.unwrap().unwrap();
        assert_eq!(record.progress, PaymentProgress::Registered);
        assert!(record.payload.is_none());
    }

    #[tokio::test]
    async fn unknown_key_has_no_record() {
        let book = PaymentBook::new();
        let record = book.process(GetPaymentRecord { key: key() }).await.unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn webhook_email_matches_case_insensitively() {
        let book = PaymentBook::new();
        let recorded = book
            .process(RecordWebhook {
                payload: payload("COMPLETED", Some("PAYER@example.com")),
            })
            .await
            .unwrap();
        assert_eq!(recorded, Some(PaymentProgress::Completed));

        let record = book.process(GetPaymentRecord { key: key() }).await.unwrap().unwrap();
        assert_eq!(record.progress, PaymentProgress::Completed);
        assert_eq!(record.payload.unwrap().payment_id, "pay-1");
    }

    #[tokio::test]
    async fn completed_is_not_downgraded() {
        let book = PaymentBook::new();
        book.process(RecordWebhook {
            payload: payload("COMPLETED", Some("payer@example.com")),
        })
        .await
        .unwrap();
        let recorded = book
            .process(RecordWebhook {
                payload: payload("PENDING", Some("payer@example.com")),
            })
            .await
            .unwrap();
        assert_eq!(recorded, Some(PaymentProgress::Completed));
    }

    #[tokio::test]
    async fn registration_does_not_hide_webhook() {
        let book = PaymentBook::new();
        book.process(RecordWebhook {
            payload: payload("PENDING", Some("payer@example.com")),
        })
        .await
        .unwrap();
        let progress = book.process(RegisterPayment { key: key() }).await.unwrap();
        assert_eq!(progress, Some(PaymentProgress::Pending));
    }

    #[tokio::test]
    async fn skips_unkeyed_and_unknown_status() {
        let book = PaymentBook::new();
        let no_email = book
            .process(RecordWebhook {
                payload: payload("COMPLETED", None),
            })
            .await
            .unwrap();
        assert_eq!(no_email, None);

        let refunded = book
            .process(RecordWebhook {
                payload: payload("REFUNDED", Some("payer@example.com")),
            })
            .await
            .unwrap();
        assert_eq!(refunded, None);
        assert!(book.is_empty().await);
    }

    fn limits(ttl_secs: u64, max: usize) -> PaymentBookConfig {
        PaymentBookConfig {
            registration_ttl: Duration::from_secs(ttl_secs),
            max_registrations: max,
        }
    }

    fn payer(n: usize) -> PaymentKey {
        PaymentKey::new("link-1", &format!("payer{n}@example.com"))
    }

    #[tokio::test]
    async fn sweep_evicts_only_expired_registrations() {
        let book = PaymentBook::with_config(limits(60, 100));
        book.process(RegisterPayment { key: payer(1) }).await.unwrap();
        book.process(RegisterPayment { key: key() }).await.unwrap();
        book.process(RecordWebhook {
            payload: payload("PENDING", Some("payer@example.com")),
        })
        .await
        .unwrap();

        let now = OffsetDateTime::now_utc();
        let evicted = book.process(SweepRegistrations { now }).await.unwrap();
        assert_eq!(evicted, 0);
        assert_eq!(book.len().await, 2);

        let later = now + time::Duration::minutes(2);
        let evicted = book.process(SweepRegistrations { now: later }).await.unwrap();
        assert_eq!(evicted, 1);
        assert!(book.process(GetPaymentRecord { key: payer(1) }).await.unwrap().is_none());
        let kept = book.process(GetPaymentRecord { key: key() }).await.unwrap().unwrap();
        assert_eq!(kept.progress, PaymentProgress::Pending);
    }

    #[tokio::test]
    async fn sweep_keeps_completed_records() {
        let book = PaymentBook::with_config(limits(60, 100));
        book.process(RecordWebhook {
            payload: payload("COMPLETED", Some("payer@example.com")),
        })
        .await
        .unwrap();
        let later = OffsetDateTime::now_utc() + time::Duration::days(1);
        let evicted = book.process(SweepRegistrations { now: later }).await.unwrap();
        assert_eq!(evicted, 0);
        assert_eq!(book.len().await, 1);
    }

    #[tokio::test]
    async fn registrations_are_capped() {
        let book = PaymentBook::with_config(limits(60, 2));
        assert!(book.process(RegisterPayment { key: payer(1) }).await.unwrap().is_some());
        assert!(book.process(RegisterPayment { key: payer(2) }).await.unwrap().is_some());
        assert_eq!(book.process(RegisterPayment { key: payer(3) }).await.unwrap(), None);
        assert_eq!(book.len().await, 2);

        // Existing attempts still answer at the cap.
        assert_eq!(
            book.process(RegisterPayment { key: payer(1) }).await.unwrap(),
            Some(PaymentProgress::Registered)
        );
    }

    #[tokio::test]
    async fn confirmed_registration_frees_its_slot() {
        let book = PaymentBook::with_config(limits(60, 1));
        book.process(RegisterPayment { key: key() }).await.unwrap();
        assert_eq!(book.process(RegisterPayment { key: payer(1) }).await.unwrap(), None);

        let recorded = book
            .process(RecordWebhook {
                payload: payload("COMPLETED", Some("payer@example.com")),
            })
            .await
            .unwrap();
        assert_eq!(recorded, Some(PaymentProgress::Completed));

        assert_eq!(
            book.process(RegisterPayment { key: payer(1) }).await.unwrap(),
            Some(PaymentProgress::Registered)
        );
        assert_eq!(book.process(RegisterPayment { key: payer(2) }).await.unwrap(), None);
        assert_eq!(book.len().await, 2);
    }
}
