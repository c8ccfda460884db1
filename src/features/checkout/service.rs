use super::models::{CheckoutReceipt, PaymentSubmissionDto};
use crate::features::access;
use crate::features::subscriptions;
use crate::features::transactions::{self, NewTransaction, PaymentType, Transaction, TransactionMetadata};
use crate::shared::database::run_in_transaction;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::principal::Principal;
use crate::shared::utils::{
    validate_amount, validate_currency, validate_required_field, validate_text_length,
};
use rusqlite::{Connection, TransactionBehavior};

/// サブスクリプション期間の上限（日数）
const MAX_DURATION_DAYS: u32 = 366;

/// 支払い申請DTOのバリデーション
pub fn validate_payment_submission(dto: &PaymentSubmissionDto) -> AppResult<()> {
    validate_required_field(&dto.plan_id, "プランID")?;
    validate_amount(dto.amount)?;
    validate_currency(&dto.currency)?;
    validate_required_field(&dto.proof_of_payment, "支払い証明")?;
    validate_text_length(&dto.proof_of_payment, 500, "支払い証明")?;

    if let Some(days) = dto.duration_days {
        if days == 0 || days > MAX_DURATION_DAYS {
            return Err(AppError::validation(format!(
                "期間は1日から{MAX_DURATION_DAYS}日の範囲で入力してください"
            )));
        }
    }

    Ok(())
}

fn to_metadata(dto: &PaymentSubmissionDto, include_duration: bool) -> TransactionMetadata {
    TransactionMetadata {
        proof_of_payment: dto.proof_of_payment.trim().to_string(),
        duration_days: dto.duration_days.filter(|_| include_duration),
        extra: dto.extra.clone(),
    }
}

/// サブスクリプション料金の支払いを申請する
///
/// 保留中のサブスクリプションを取得または作成し、それに紐付いた取引を記録する。
///
/// # 引数
/// * `conn` - データベース接続
/// * `principal` - 認証済みの利用者
/// * `dto` - 支払い申請の内容
///
/// # 戻り値
/// サブスクリプションと記録された取引
pub fn begin_checkout(
    conn: &Connection,
    principal: &Principal,
    dto: PaymentSubmissionDto,
) -> AppResult<CheckoutReceipt> {
    principal.require_identified()?;
    validate_payment_submission(&dto)?;

    run_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let subscription =
            subscriptions::create_or_fetch_pending(tx, &principal.user_id, &dto.plan_id)?;

        let transaction = transactions::record_pending(
            tx,
            NewTransaction {
                user_id: principal.user_id.clone(),
                plan_id: dto.plan_id.clone(),
                subscription_id: Some(subscription.id.clone()),
                payment_type: PaymentType::Subscription,
                amount: dto.amount,
                currency: dto.currency.clone(),
                metadata: to_metadata(&dto, true),
            },
        )?;

        Ok(CheckoutReceipt {
            subscription,
            transaction,
        })
    })
}

/// 有効化料金の支払いを申請する
///
/// 閲覧可否の判定が「有効化料金が必要」の場合のみ受け付ける。
///
/// # 引数
/// * `conn` - データベース接続
/// * `principal` - 認証済みの利用者
/// * `dto` - 支払い申請の内容
///
/// # 戻り値
/// 記録された取引、または有効化料金が不要な場合は Validation
pub fn submit_activation_fee(
    conn: &Connection,
    principal: &Principal,
    dto: PaymentSubmissionDto,
) -> AppResult<Transaction> {
    principal.require_identified()?;
    validate_payment_submission(&dto)?;

    run_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let decision = access::service::check_access(tx, principal, &dto.plan_id)?;
        if !decision.requires_activation_fee() {
            log::warn!(
                "有効化料金が不要な申請を拒否しました: user_id={}, plan_id={}, reason={}",
                principal.user_id,
                dto.plan_id,
                decision.reason
            );
            return Err(AppError::validation(format!(
                "このプランの有効化料金は現在お支払いいただけません（{}）",
                decision.reason
            )));
        }

        let subscription =
            access::governing_subscription(tx, &principal.user_id, &dto.plan_id)?.ok_or_else(
                || AppError::not_found(format!("プラン {} のサブスクリプション", dto.plan_id)),
            )?;

        transactions::record_pending(
            tx,
            NewTransaction {
                user_id: principal.user_id.clone(),
                plan_id: dto.plan_id.clone(),
                subscription_id: Some(subscription.id),
                payment_type: PaymentType::Activation,
                amount: dto.amount,
                currency: dto.currency.clone(),
                metadata: to_metadata(&dto, false),
            },
        )
    })
}
