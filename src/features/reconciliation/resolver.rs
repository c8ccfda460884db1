use crate::features::subscriptions::{self, Subscription, SubscriptionStatus};
use crate::features::transactions::Transaction;
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;

/// 照合処理が使用するサブスクリプション検索
pub trait SubscriptionLookup {
    /// IDでサブスクリプションを取得する
    fn subscription_by_id(&self, id: &str) -> AppResult<Option<Subscription>>;

    /// (ユーザー, プラン) の最新のサブスクリプションを取得する
    fn latest_subscription(
        &self,
        user_id: &str,
        plan_id: &str,
        statuses: Option<&[SubscriptionStatus]>,
    ) -> AppResult<Option<Subscription>>;
}

impl SubscriptionLookup for Connection {
    fn subscription_by_id(&self, id: &str) -> AppResult<Option<Subscription>> {
        subscriptions::repository::find_optional_by_id(self, id)
    }

    fn latest_subscription(
        &self,
        user_id: &str,
        plan_id: &str,
        statuses: Option<&[SubscriptionStatus]>,
    ) -> AppResult<Option<Subscription>> {
        subscriptions::find_latest_for_user_plan(self, user_id, plan_id, statuses)
    }
}

/// サブスクリプションを特定した方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// 取引に紐付いたIDで直接取得した
    Linked,
    /// 支払い中（pending / pending_activation）の最新の行
    InProgress,
    /// 状態を問わない最新の行
    MostRecent,
}

impl ResolutionStrategy {
    /// 検索によって特定したか（取引への紐付けが必要か）
    pub fn found_by_search(&self) -> bool {
        !matches!(self, ResolutionStrategy::Linked)
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolutionStrategy::Linked => "linked",
            ResolutionStrategy::InProgress => "in_progress",
            ResolutionStrategy::MostRecent => "most_recent",
        };
        f.write_str(label)
    }
}

/// 照合結果
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub subscription: Subscription,
    pub strategy: ResolutionStrategy,
}

/// 取引に対応するサブスクリプションを特定する
///
/// 次の順に検索し、最初に見つかったものを返す:
/// 1. 取引の `subscription_id`
/// 2. 同じ (ユーザー, プラン) で支払い中の最新の行
/// 3. 同じ (ユーザー, プラン) で状態を問わない最新の行
///
/// 新しいサブスクリプションを作成することはない。
///
/// # 引数
/// * `lookup` - サブスクリプション検索
/// * `transaction` - 照合対象の取引
///
/// # 戻り値
/// 照合結果、またはどの方法でも見つからない場合は SubscriptionNotFound
pub fn resolve_subscription<L>(lookup: &L, transaction: &Transaction) -> AppResult<Resolution>
where
    L: SubscriptionLookup + ?Sized,
{
    let not_found = || AppError::SubscriptionNotFound {
        transaction_id: transaction.id.clone(),
    };

    if let Some(subscription_id) = &transaction.subscription_id {
        // 紐付け済みの取引は検索にフォールバックしない
        let subscription = lookup.subscription_by_id(subscription_id)?.ok_or_else(|| {
            log::error!(
                "紐付け先のサブスクリプションが存在しません: transaction_id={}, subscription_id={subscription_id}",
                transaction.id
            );
            not_found()
        })?;
        return Ok(Resolution {
            subscription,
            strategy: ResolutionStrategy::Linked,
        });
    }

    if let Some(subscription) = lookup.latest_subscription(
        &transaction.user_id,
        &transaction.plan_id,
        Some(SubscriptionStatus::IN_PROGRESS.as_slice()),
    )? {
        log::debug!(
            "支払い中のサブスクリプションに照合しました: transaction_id={}, subscription_id={}",
            transaction.id,
            subscription.id
        );
        return Ok(Resolution {
            subscription,
            strategy: ResolutionStrategy::InProgress,
        });
    }

    if let Some(subscription) =
        lookup.latest_subscription(&transaction.user_id, &transaction.plan_id, None)?
    {
        log::warn!(
            "支払い中のサブスクリプションがないため最新の行に照合しました: transaction_id={}, subscription_id={}, status={}",
            transaction.id,
            subscription.id,
            subscription.status
        );
        return Ok(Resolution {
            subscription,
            strategy: ResolutionStrategy::MostRecent,
        });
    }

    log::error!(
        "取引に対応するサブスクリプションが見つかりません: transaction_id={}, user_id={}, plan_id={}",
        transaction.id,
        transaction.user_id,
        transaction.plan_id
    );
    Err(not_found())
}
