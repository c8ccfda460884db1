use super::evaluator::{evaluate, AccessDecision};
use crate::features::plans;
use crate::features::subscriptions::{self, Subscription, SubscriptionStatus};
use crate::shared::errors::AppResult;
use crate::shared::principal::Principal;
use rusqlite::Connection;

/// 閲覧可否の判定に使用するサブスクリプションを取得する
///
/// 有効な行があれば最新の有効な行、なければ状態を問わず最新の行を返す。
pub fn governing_subscription(
    conn: &Connection,
    user_id: &str,
    plan_id: &str,
) -> AppResult<Option<Subscription>> {
    let active = subscriptions::find_latest_for_user_plan(
        conn,
        user_id,
        plan_id,
        Some(&[SubscriptionStatus::Active][..]),
    )?;
    if active.is_some() {
        return Ok(active);
    }

    subscriptions::find_latest_for_user_plan(conn, user_id, plan_id, None)
}

/// 利用者がプランのコンテンツを閲覧できるか判定する
///
/// データストアのエラーは閲覧可として扱わず、そのまま返す。
///
/// # 引数
/// * `conn` - データベース接続
/// * `principal` - 認証済みの利用者
/// * `plan_id` - プランID
///
/// # 戻り値
/// 判定結果、またはプランが存在しない場合は NotFound
pub fn check_access(
    conn: &Connection,
    principal: &Principal,
    plan_id: &str,
) -> AppResult<AccessDecision> {
    principal.require_identified()?;

    let plan = plans::repository::find_by_id(conn, plan_id)?;
    let subscription = governing_subscription(conn, &principal.user_id, plan_id)?;
    let decision = evaluate(subscription.as_ref(), &plan);

    log::debug!(
        "閲覧可否を判定しました: user_id={}, plan={}, unlocked={}, reason={}",
        principal.user_id,
        plan.slug,
        decision.unlocked,
        decision.reason
    );
    Ok(decision)
}
