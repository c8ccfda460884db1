use crate::features::reconciliation::ResolutionStrategy;
use crate::features::subscriptions::LedgerOutcome;
use crate::features::transactions::{PaymentType, Transaction};
use crate::shared::errors::{AppError, AppResult};
use serde::Serialize;
use std::fmt;

/// 管理者による確認ワークフローの状態
///
/// SUBMITTED → PAYMENT_CONFIRMED → ACTIVATED の順に進む。
/// 有効化料金の取引のみ SUBMITTED から直接 ACTIVATED に進める。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Submitted,
    PaymentConfirmed,
    Activated,
}

impl WorkflowState {
    /// 状態を遷移させる
    ///
    /// # 引数
    /// * `target` - 遷移先
    /// * `payment_type` - 取引の支払い種別
    ///
    /// # 戻り値
    /// 遷移後の状態、または許可されない遷移の場合は InvalidTransition
    pub fn transition(self, target: WorkflowState, payment_type: PaymentType) -> AppResult<WorkflowState> {
        use WorkflowState::*;

        let allowed = match (self, target) {
            (Submitted, PaymentConfirmed) => true,
            (PaymentConfirmed, Activated) => true,
            (Submitted, Activated) => payment_type == PaymentType::Activation,
            _ => false,
        };

        if allowed {
            Ok(target)
        } else {
            Err(AppError::invalid_transition(format!(
                "{payment_type} 取引を {self} から {target} に進めることはできません"
            )))
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowState::Submitted => "SUBMITTED",
            WorkflowState::PaymentConfirmed => "PAYMENT_CONFIRMED",
            WorkflowState::Activated => "ACTIVATED",
        };
        f.write_str(label)
    }
}

/// 有効化処理の結果
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationOutcome {
    /// 処理後の取引
    pub transaction: Transaction,
    /// サブスクリプションを特定した方法
    pub strategy: ResolutionStrategy,
    /// 台帳への変更結果
    pub ledger: LedgerOutcome,
}

impl ActivationOutcome {
    /// 今回の呼び出しで台帳を変更したか
    pub fn was_applied(&self) -> bool {
        self.ledger.was_applied()
    }
}
