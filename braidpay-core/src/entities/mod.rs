pub mod payment_book;
pub mod processed_payments;

pub use payment_book::{
    GetPaymentRecord, PaymentBook, PaymentKey, PaymentProgress, PaymentRecord, RecordWebhook,
    RegisterPayment, SweepRegistrations,
};
pub use processed_payments::{MemoryProcessedPayments, ProcessedPayments};
