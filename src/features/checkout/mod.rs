/// 利用者からの支払い申請
pub mod commands;
pub mod models;
pub mod service;

pub use models::{CheckoutReceipt, PaymentSubmissionDto};
pub use service::{begin_checkout, submit_activation_fee, validate_payment_submission};
