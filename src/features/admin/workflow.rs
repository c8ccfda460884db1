use super::models::{ActivationOutcome, WorkflowState};
use crate::features::reconciliation::resolve_subscription;
use crate::features::subscriptions::{self, LedgerOutcome};
use crate::features::transactions::{
    self, CompletionOutcome, PaymentType, Transaction, TransactionStatus,
};
use crate::shared::config::BillingConfig;
use crate::shared::database::run_in_transaction;
use crate::shared::errors::AppResult;
use crate::shared::principal::Principal;
use rusqlite::{Connection, TransactionBehavior};

/// 取引の現在のワークフロー状態を求める
///
/// ACTIVATED はこの取引自体の反映記録（`activated_at`）から判定する。
/// 同じサブスクリプションに別の取引が反映済みでも、この取引の状態には影響しない。
fn derive_state(transaction: &Transaction) -> WorkflowState {
    if transaction.is_activated() {
        WorkflowState::Activated
    } else if transaction.status == TransactionStatus::Pending {
        WorkflowState::Submitted
    } else {
        WorkflowState::PaymentConfirmed
    }
}

/// 取引のワークフロー状態を取得する（管理画面用）
pub fn workflow_state(
    conn: &Connection,
    principal: &Principal,
    transaction_id: &str,
) -> AppResult<WorkflowState> {
    principal.require_admin("workflow_state")?;
    let transaction = transactions::find_by_id(conn, transaction_id)?;
    Ok(derive_state(&transaction))
}

/// 支払いを確認する（SUBMITTED → PAYMENT_CONFIRMED）
///
/// 取引を完了にするだけで、サブスクリプション台帳には触れない。
///
/// # 引数
/// * `conn` - データベース接続
/// * `principal` - 操作する管理者
/// * `transaction_id` - 取引ID
///
/// # 戻り値
/// 完了処理の結果（既に確認済みの場合は `AlreadyCompleted`）
pub fn confirm_payment(
    conn: &Connection,
    principal: &Principal,
    transaction_id: &str,
) -> AppResult<CompletionOutcome> {
    principal.require_admin("confirm_payment")?;

    let transaction = transactions::find_by_id(conn, transaction_id)?;
    if transaction.status == TransactionStatus::Completed {
        log::warn!("支払いは既に確認済みです: transaction_id={transaction_id}");
        return Ok(CompletionOutcome::AlreadyCompleted(transaction));
    }

    WorkflowState::Submitted.transition(WorkflowState::PaymentConfirmed, transaction.payment_type)?;
    let outcome = transactions::mark_completed(conn, transaction_id)?;

    log::info!(
        "支払いを確認しました: transaction_id={transaction_id}, admin={}",
        principal.user_id
    );
    Ok(outcome)
}

/// 取引をサブスクリプションに反映する（→ ACTIVATED）
///
/// サブスクリプションの特定、台帳の変更、取引の完了、紐付けの補完、反映記録をひとつのトランザクションで行う。
/// 途中で失敗した場合は何も書き込まれない。
/// 既に反映済みの取引に対しては台帳に触れずに `AlreadyApplied` を返す。
///
/// # 引数
/// * `conn` - データベース接続
/// * `config` - 課金設定（既定の日数）
/// * `principal` - 操作する管理者
/// * `transaction_id` - 取引ID
///
/// # 戻り値
/// 有効化処理の結果
pub fn activate(
    conn: &Connection,
    config: &BillingConfig,
    principal: &Principal,
    transaction_id: &str,
) -> AppResult<ActivationOutcome> {
    principal.require_admin("activate")?;

    run_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let transaction = transactions::find_by_id(tx, transaction_id)?;

        if transaction.is_activated() {
            let resolution = resolve_subscription(tx, &transaction)?;
            log::warn!(
                "取引は既に反映済みです: transaction_id={transaction_id}, subscription_id={}",
                resolution.subscription.id
            );
            return Ok(ActivationOutcome {
                transaction,
                strategy: resolution.strategy,
                ledger: LedgerOutcome::AlreadyApplied(resolution.subscription),
            });
        }

        derive_state(&transaction).transition(WorkflowState::Activated, transaction.payment_type)?;

        let resolution = resolve_subscription(tx, &transaction)?;
        let subscription_id = resolution.subscription.id.as_str();

        let ledger = match transaction.payment_type {
            PaymentType::Subscription => {
                let duration_days = transaction
                    .metadata
                    .duration_days
                    .unwrap_or(config.default_subscription_days);
                subscriptions::apply_subscription_activation(tx, subscription_id, duration_days)?
            }
            PaymentType::Activation => {
                let ledger = subscriptions::apply_activation_fee_payment(
                    tx,
                    subscription_id,
                    config.activation_fallback_days,
                )?;
                transactions::mark_completed(tx, transaction_id)?;
                ledger
            }
        };

        if resolution.strategy.found_by_search() {
            transactions::backfill_subscription_id(tx, transaction_id, subscription_id)?;
        }
        let transaction = transactions::mark_activated(tx, transaction_id)?;

        log::info!(
            "取引を有効化しました: transaction_id={transaction_id}, subscription_id={subscription_id}, payment_type={}, strategy={}, applied={}, admin={}",
            transaction.payment_type,
            resolution.strategy,
            ledger.was_applied(),
            principal.user_id
        );

        Ok(ActivationOutcome {
            transaction,
            strategy: resolution.strategy,
            ledger,
        })
    })
    .map_err(|e| {
        log::error!("有効化に失敗しました: transaction_id={transaction_id}, error={e}");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::plans::{repository as plan_repository, CreatePlanDto, Plan};
    use crate::features::reconciliation::ResolutionStrategy;
    use crate::features::subscriptions::SubscriptionStatus;
    use crate::features::transactions::{NewTransaction, TransactionMetadata};
    use crate::shared::database::initialize_in_memory_database;
    use crate::shared::errors::AppError;
    use chrono::Duration;

    fn create_test_db(requires_activation: bool) -> (Connection, Plan) {
        let conn = initialize_in_memory_database().unwrap();
        let plan = plan_repository::create(
            &conn,
            CreatePlanDto {
                slug: "profit-multiplier".to_string(),
                name: "Profit Multiplier".to_string(),
                requires_activation,
                max_predictions_per_day: None,
            },
        )
        .unwrap();
        (conn, plan)
    }

    fn record(
        conn: &Connection,
        plan: &Plan,
        subscription_id: Option<String>,
        payment_type: PaymentType,
        duration_days: Option<u32>,
    ) -> Transaction {
        let mut metadata = TransactionMetadata::new("uploads/proof.png");
        metadata.duration_days = duration_days;
        transactions::record_pending(
            conn,
            NewTransaction {
                user_id: "user-1".to_string(),
                plan_id: plan.id.clone(),
                subscription_id,
                payment_type,
                amount: 2500.0,
                currency: "NGN".to_string(),
                metadata,
            },
        )
        .unwrap()
    }

    fn admin() -> Principal {
        Principal::admin("admin-1")
    }

    #[test]
    fn test_confirm_payment_requires_admin() {
        let (conn, plan) = create_test_db(false);
        let tx = record(&conn, &plan, None, PaymentType::Subscription, Some(30));

        let result = confirm_payment(&conn, &Principal::member("user-1"), &tx.id);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        assert_eq!(
            transactions::find_by_id(&conn, &tx.id).unwrap().status,
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_confirm_payment_twice() {
        let (conn, plan) = create_test_db(false);
        let tx = record(&conn, &plan, None, PaymentType::Subscription, Some(30));

        assert!(confirm_payment(&conn, &admin(), &tx.id).unwrap().was_completed_now());
        assert!(!confirm_payment(&conn, &admin(), &tx.id).unwrap().was_completed_now());
        assert_eq!(
            workflow_state(&conn, &admin(), &tx.id).unwrap(),
            WorkflowState::PaymentConfirmed
        );
    }

    #[test]
    fn test_confirm_payment_does_not_touch_ledger() {
        let (conn, plan) = create_test_db(false);
        let sub = subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let tx = record(&conn, &plan, None, PaymentType::Subscription, Some(30));

        confirm_payment(&conn, &admin(), &tx.id).unwrap();
        assert_eq!(subscriptions::find_by_id(&conn, &sub.id).unwrap(), sub);
    }

    #[test]
    fn test_activate_submitted_subscription_payment_is_rejected() {
        let (conn, plan) = create_test_db(false);
        let sub = subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let tx = record(&conn, &plan, None, PaymentType::Subscription, Some(30));

        let result = activate(&conn, &BillingConfig::default(), &admin(), &tx.id);
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(subscriptions::find_by_id(&conn, &sub.id).unwrap(), sub);
    }

    #[test]
    fn test_activate_subscription_payment_backfills_link() {
        let (conn, plan) = create_test_db(false);
        let sub = subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let tx = record(&conn, &plan, None, PaymentType::Subscription, Some(14));
        confirm_payment(&conn, &admin(), &tx.id).unwrap();

        let outcome = activate(&conn, &BillingConfig::default(), &admin(), &tx.id).unwrap();
        assert!(outcome.was_applied());
        assert_eq!(outcome.strategy, ResolutionStrategy::InProgress);
        assert_eq!(outcome.transaction.subscription_id.as_deref(), Some(sub.id.as_str()));

        let activated = outcome.ledger.subscription();
        assert_eq!(activated.status, SubscriptionStatus::Active);
        assert_eq!(
            activated.expiry_date.unwrap() - activated.start_date.unwrap(),
            Duration::days(14)
        );
        assert_eq!(
            workflow_state(&conn, &admin(), &tx.id).unwrap(),
            WorkflowState::Activated
        );
    }

    #[test]
    fn test_activate_uses_configured_default_duration() {
        let (conn, plan) = create_test_db(false);
        subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let tx = record(&conn, &plan, None, PaymentType::Subscription, None);
        confirm_payment(&conn, &admin(), &tx.id).unwrap();

        let config = BillingConfig {
            default_subscription_days: 7,
            ..BillingConfig::default()
        };
        let outcome = activate(&conn, &config, &admin(), &tx.id).unwrap();
        let sub = outcome.ledger.subscription();
        assert_eq!(sub.expiry_date.unwrap() - sub.start_date.unwrap(), Duration::days(7));
    }

    #[test]
    fn test_activate_twice_reports_already_applied() {
        let (conn, plan) = create_test_db(false);
        subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let tx = record(&conn, &plan, None, PaymentType::Subscription, Some(30));
        confirm_payment(&conn, &admin(), &tx.id).unwrap();

        let first = activate(&conn, &BillingConfig::default(), &admin(), &tx.id).unwrap();
        let second = activate(&conn, &BillingConfig::default(), &admin(), &tx.id).unwrap();

        assert!(first.was_applied());
        assert!(!second.was_applied());
        assert_eq!(second.strategy, ResolutionStrategy::Linked);
        assert_eq!(second.ledger.subscription(), first.ledger.subscription());
    }

    #[test]
    fn test_each_payment_on_same_subscription_is_activated_separately() {
        let (conn, plan) = create_test_db(false);
        let sub = subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let first = record(&conn, &plan, Some(sub.id.clone()), PaymentType::Subscription, Some(30));
        let renewal = record(&conn, &plan, Some(sub.id.clone()), PaymentType::Subscription, Some(90));
        confirm_payment(&conn, &admin(), &first.id).unwrap();
        confirm_payment(&conn, &admin(), &renewal.id).unwrap();

        let outcome = activate(&conn, &BillingConfig::default(), &admin(), &first.id).unwrap();
        let after_first = outcome.ledger.subscription().clone();
        assert_eq!(
            workflow_state(&conn, &admin(), &first.id).unwrap(),
            WorkflowState::Activated
        );
        // 同じ行が有効になっていても、未反映の取引は確認済みのまま
        assert_eq!(
            workflow_state(&conn, &admin(), &renewal.id).unwrap(),
            WorkflowState::PaymentConfirmed
        );

        let outcome = activate(&conn, &BillingConfig::default(), &admin(), &renewal.id).unwrap();
        assert!(outcome.was_applied());
        let renewed = outcome.ledger.subscription();
        assert_eq!(renewed.id, sub.id);
        assert_eq!(
            renewed.expiry_date.unwrap() - renewed.start_date.unwrap(),
            Duration::days(90)
        );
        assert!(renewed.expiry_date > after_first.expiry_date);
        assert_eq!(
            workflow_state(&conn, &admin(), &renewal.id).unwrap(),
            WorkflowState::Activated
        );
    }

    #[test]
    fn test_activate_twice_does_not_extend_window_again() {
        let (conn, plan) = create_test_db(false);
        let sub = subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let tx = record(&conn, &plan, Some(sub.id.clone()), PaymentType::Subscription, Some(30));
        confirm_payment(&conn, &admin(), &tx.id).unwrap();

        let first = activate(&conn, &BillingConfig::default(), &admin(), &tx.id).unwrap();
        let again = activate(&conn, &BillingConfig::default(), &admin(), &tx.id).unwrap();

        assert!(!again.was_applied());
        assert_eq!(again.transaction.activated_at, first.transaction.activated_at);
        assert_eq!(
            subscriptions::find_by_id(&conn, &sub.id).unwrap(),
            *first.ledger.subscription()
        );
    }

    #[test]
    fn test_activate_activation_payment_from_submitted() {
        let (conn, plan) = create_test_db(true);
        let sub = subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let paid = subscriptions::apply_subscription_activation(&conn, &sub.id, 30)
            .unwrap()
            .into_subscription();
        let tx = record(&conn, &plan, Some(sub.id.clone()), PaymentType::Activation, None);

        let outcome = activate(&conn, &BillingConfig::default(), &admin(), &tx.id).unwrap();
        assert_eq!(outcome.strategy, ResolutionStrategy::Linked);
        assert_eq!(outcome.transaction.status, TransactionStatus::Completed);

        let updated = outcome.ledger.subscription();
        assert!(updated.activation_fee_paid);
        assert_eq!(updated.expiry_date, paid.expiry_date);
    }

    #[test]
    fn test_activate_without_subscription_writes_nothing() {
        let (conn, plan) = create_test_db(true);
        let tx = record(&conn, &plan, None, PaymentType::Activation, None);

        let result = activate(&conn, &BillingConfig::default(), &admin(), &tx.id);
        assert!(matches!(result, Err(AppError::SubscriptionNotFound { .. })));

        let unchanged = transactions::find_by_id(&conn, &tx.id).unwrap();
        assert_eq!(unchanged, tx);
        assert!(subscriptions::find_all_for_user(&conn, "user-1").unwrap().is_empty());
    }

    #[test]
    fn test_activate_rejects_zero_duration_without_writes() {
        let (conn, plan) = create_test_db(true);
        let sub = subscriptions::create_or_fetch_pending(&conn, "user-1", &plan.id).unwrap();
        let tx = record(&conn, &plan, Some(sub.id.clone()), PaymentType::Subscription, Some(0));
        confirm_payment(&conn, &admin(), &tx.id).unwrap();

        // 期間0日は台帳側で拒否される
        let result = activate(&conn, &BillingConfig::default(), &admin(), &tx.id);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(subscriptions::find_by_id(&conn, &sub.id).unwrap(), sub);
        assert_eq!(
            workflow_state(&conn, &admin(), &tx.id).unwrap(),
            WorkflowState::PaymentConfirmed
        );
    }

    #[test]
    fn test_activate_requires_admin() {
        let (conn, plan) = create_test_db(false);
        let tx = record(&conn, &plan, None, PaymentType::Activation, None);
        let result = activate(&conn, &BillingConfig::default(), &Principal::member("user-1"), &tx.id);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
