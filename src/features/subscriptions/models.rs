use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// サブスクリプションの状態
///
/// 遷移は前進のみ:
///
/// | From              | To                | 可否 |
/// |-------------------|-------------------|------|
/// | Pending           | PendingActivation | 可   |
/// | Pending           | Active            | 可   |
/// | PendingActivation | Active            | 可   |
/// | Active            | Active            | 可（料金フラグの追加のみ） |
/// | Active            | それ以外          | 不可 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// 初回チェックアウト直後
    Pending,
    /// 有効化料金の確認待ち
    PendingActivation,
    /// 有効
    Active,
}

impl SubscriptionStatus {
    /// 照合処理で「支払い中」とみなす状態
    pub const IN_PROGRESS: [SubscriptionStatus; 2] = [
        SubscriptionStatus::Pending,
        SubscriptionStatus::PendingActivation,
    ];

    /// 永続化用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::PendingActivation => "pending_activation",
            SubscriptionStatus::Active => "active",
        }
    }

    pub fn is_in_progress(&self) -> bool {
        Self::IN_PROGRESS.contains(self)
    }

    /// 指定した状態へ遷移できるか
    pub fn can_transition_to(&self, target: &SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Pending, Pending)
                | (Pending, PendingActivation)
                | (Pending, Active)
                | (PendingActivation, PendingActivation)
                | (PendingActivation, Active)
                | (Active, Active)
        )
    }

    /// 遷移を検証する
    ///
    /// # 戻り値
    /// 遷移可能ならOk(())、それ以外は InvalidTransition
    pub fn validate_transition(&self, target: &SubscriptionStatus) -> AppResult<()> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(AppError::invalid_transition(format!(
                "サブスクリプションを {self} から {target} に変更することはできません"
            )))
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(SubscriptionStatus::Pending),
            "pending_activation" => Ok(SubscriptionStatus::PendingActivation),
            "active" => Ok(SubscriptionStatus::Active),
            other => Err(AppError::Database(format!(
                "不明なサブスクリプション状態です: {other}"
            ))),
        }
    }
}

impl ToSql for SubscriptionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubscriptionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

/// サブスクリプション（ユーザーがプランを保有している記録）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub subscription_fee_paid: bool,
    pub activation_fee_paid: bool,
    /// 有効化時にのみ設定される
    pub start_date: Option<DateTime<Utc>>,
    /// 有効化時にのみ設定される
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 台帳への変更結果
///
/// 既に反映済みの取引や支払い済みの有効化料金を再度適用しようとした場合は
/// `AlreadyApplied` になり、行は書き換えられない。
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    /// 今回の呼び出しで変更を適用した
    Applied(Subscription),
    /// 既に適用済みだった
    AlreadyApplied(Subscription),
}

impl LedgerOutcome {
    pub fn subscription(&self) -> &Subscription {
        match self {
            LedgerOutcome::Applied(sub) | LedgerOutcome::AlreadyApplied(sub) => sub,
        }
    }

    pub fn into_subscription(self) -> Subscription {
        match self {
            LedgerOutcome::Applied(sub) | LedgerOutcome::AlreadyApplied(sub) => sub,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, LedgerOutcome::Applied(_))
    }
}
