//! Background eviction of registrations no webhook ever confirmed.

use braidpay_core::entities::{PaymentBook, SweepRegistrations};
use kanau::processor::Processor;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Sweep `book` every [`sweep_interval`] until the handle is aborted.
///
/// [`sweep_interval`]: braidpay_core::config::PaymentBookConfig::sweep_interval
pub fn spawn_registration_sweeper(book: PaymentBook) -> JoinHandle<()> {
    let period = book.limits().sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(?period, "Registration sweeper started");
        loop {
            ticker.tick().await;
            let Ok(evicted) = book
                .process(SweepRegistrations {
                    now: OffsetDateTime::now_utc(),
                })
                .await;
            if evicted > 0 {
                tracing::info!(evicted, "Evicted expired payment registrations");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use braidpay_core::config::PaymentBookConfig;
    use braidpay_core::entities::{PaymentKey, RegisterPayment};
    use std::time::Duration;

    #[tokio::test]
    async fn sweeper_evicts_expired_registrations() {
        let book = PaymentBook::with_config(PaymentBookConfig {
            registration_ttl: Duration::ZERO,
            max_registrations: 10,
        });
        book.process(RegisterPayment {
            key: PaymentKey::new("link-1", "payer@example.com"),
        })
        .await
        .unwrap();
        assert_eq!(book.len().await, 1);

        let sweeper = spawn_registration_sweeper(book.clone());
        tokio::time::timeout(Duration::from_secs(5), async {
            while !book.is_empty().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        sweeper.abort();
    }
}
