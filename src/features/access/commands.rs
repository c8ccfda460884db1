use super::evaluator::AccessDecision;
use super::service;
use crate::shared::errors::AppResult;
use crate::shared::principal::Principal;
use crate::AppState;

/// プランのコンテンツを閲覧できるか判定する
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `principal` - 認証済みの利用者
/// * `plan_id` - プランID
///
/// # 戻り値
/// 判定結果
pub fn check_access(
    state: &AppState,
    principal: &Principal,
    plan_id: &str,
) -> AppResult<AccessDecision> {
    let db = state.connection()?;
    service::check_access(&db, principal, plan_id)
}
