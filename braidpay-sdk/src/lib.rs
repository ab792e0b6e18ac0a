//! SDK for embedding BraidPay hosted checkout.
//!
//! * [`signature`] – webhook HMAC signing and constant-time verification.
//! * [`objects`] – webhook, status-endpoint and checkout-frame wire types.
//! * [`email`] – the email grammar used before registering a payment.
//! * `client` (feature `client`) – verification endpoint client and the
//!   payment status poller.

pub mod email;
pub mod objects;
pub mod signature;

#[cfg(feature = "client")]
pub mod client;
