//! Processors for incoming provider notifications.
//!
//! - `WebhookProcessor`: verifies an `IncomingWebhook` and dispatches it to a
//!   `WebhookHandler`
//! - `Idempotent`: handler wrapper that skips payment ids already processed

pub mod handlers;
pub mod webhook;

pub use handlers::{Idempotent, WebhookHandler};
pub use webhook::{IncomingWebhook, WebhookError, WebhookProcessor};
