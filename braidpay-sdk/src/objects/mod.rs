pub mod blockchains;
pub mod frame;
pub mod status;
pub mod webhook;

pub use blockchains::{Network, Token};
pub use frame::{FrameMessageKind, FrameOutcome, PaymentCompleteMessage};
pub use status::{PaymentStatus, StatusAction, StatusCheckRequest, StatusCheckResponse};
pub use webhook::{VerificationResult, WebhookPayload, WebhookStatus};
