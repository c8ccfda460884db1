/// サブスクリプション台帳
///
/// ユーザーとプランの関係（状態、料金支払いフラグ、有効期間）を管理する：
/// - 保留中サブスクリプションの取得または作成
/// - サブスクリプション料金・有効化料金の反映（条件付き更新）
/// - (ユーザー, プラン) での検索
pub mod models;
pub mod repository;

pub use models::{LedgerOutcome, Subscription, SubscriptionStatus};

pub use repository::{
    apply_activation_fee_payment, apply_subscription_activation, create_or_fetch_pending,
    find_all_for_user, find_by_id, find_latest_for_user_plan,
};
