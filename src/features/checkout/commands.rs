use super::models::{CheckoutReceipt, PaymentSubmissionDto};
use super::service;
use crate::features::{subscriptions, transactions};
use crate::features::subscriptions::Subscription;
use crate::features::transactions::Transaction;
use crate::shared::errors::AppResult;
use crate::shared::principal::Principal;
use crate::AppState;

/// サブスクリプション料金の支払いを申請する
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `principal` - 認証済みの利用者
/// * `dto` - 支払い申請の内容
///
/// # 戻り値
/// サブスクリプションと記録された取引
pub fn begin_checkout(
    state: &AppState,
    principal: &Principal,
    dto: PaymentSubmissionDto,
) -> AppResult<CheckoutReceipt> {
    let db = state.connection()?;
    service::begin_checkout(&db, principal, dto)
}

/// 有効化料金の支払いを申請する
pub fn submit_activation_fee(
    state: &AppState,
    principal: &Principal,
    dto: PaymentSubmissionDto,
) -> AppResult<Transaction> {
    let db = state.connection()?;
    service::submit_activation_fee(&db, principal, dto)
}

/// 自分のサブスクリプション一覧を取得する
pub fn get_my_subscriptions(state: &AppState, principal: &Principal) -> AppResult<Vec<Subscription>> {
    principal.require_identified()?;
    let db = state.connection()?;
    subscriptions::find_all_for_user(&db, &principal.user_id)
}

/// 自分の支払い履歴を取得する
pub fn get_my_transactions(state: &AppState, principal: &Principal) -> AppResult<Vec<Transaction>> {
    principal.require_identified()?;
    let db = state.connection()?;
    transactions::find_all_for_user(&db, &principal.user_id)
}
