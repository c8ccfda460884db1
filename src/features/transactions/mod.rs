/// 取引ログ
///
/// 支払いの記録はサブスクリプションの状態とは独立して保持され、削除されない。
pub mod models;
pub mod repository;

pub use models::{
    CompletionOutcome, NewTransaction, PaymentType, Transaction, TransactionMetadata,
    TransactionStatus,
};

pub use repository::{
    backfill_subscription_id, find_all_for_user, find_by_id, find_pending, mark_activated,
    mark_completed, record_pending,
};
