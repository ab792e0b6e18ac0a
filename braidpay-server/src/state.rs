//! Application state shared across all request handlers.

use crate::api::webhook::BookRecorder;
use crate::config::runtime::{PaymentBookConfig, SharedConfig};
use braidpay_core::entities::{MemoryProcessedPayments, PaymentBook};
use braidpay_core::processors::Idempotent;
use std::sync::Arc;

/// Webhook handler installed by the server: records into the payment book,
/// once per payment id.
pub type PaymentHandler = Idempotent<BookRecorder, MemoryProcessedPayments>;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
    /// Payment attempts, written by webhooks and read by status checks.
    pub book: PaymentBook,
    pub handler: Arc<PaymentHandler>,
}

impl AppState {
    /// Create a new AppState with an empty payment book bounded by `payments`.
    pub fn new(config: SharedConfig, payments: PaymentBookConfig) -> Self {
        let book = PaymentBook::with_config(payments);
        let handler = Idempotent::new(BookRecorder::new(book.clone()), MemoryProcessedPayments::new());
        Self {
            config,
            book,
            handler: Arc::new(handler),
        }
    }
}
