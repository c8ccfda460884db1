use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 支払い種別
///
/// 有効化処理でサブスクリプションのどのフィールドを変更するかを決める。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// サブスクリプション料金
    Subscription,
    /// 有効化料金
    Activation,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Subscription => "subscription",
            PaymentType::Activation => "activation",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "subscription" => Ok(PaymentType::Subscription),
            "activation" => Ok(PaymentType::Activation),
            other => Err(AppError::Database(format!("不明な支払い種別です: {other}"))),
        }
    }
}

impl ToSql for PaymentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PaymentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

/// 取引の状態（pending → completed の一方向のみ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
        }
    }

    /// 完了状態へ遷移する
    ///
    /// # 戻り値
    /// 保留中なら Completed、既に完了している場合は InvalidTransition
    pub fn complete(self) -> AppResult<TransactionStatus> {
        match self {
            TransactionStatus::Pending => Ok(TransactionStatus::Completed),
            TransactionStatus::Completed => Err(AppError::invalid_transition(
                "取引は既に完了しています",
            )),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            other => Err(AppError::Database(format!("不明な取引状態です: {other}"))),
        }
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

/// 取引に添付されるメタデータ
///
/// 既知のキー以外はそのまま保持する。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TransactionMetadata {
    /// 支払い証明（アップロード済みファイルへの参照。内容は検証しない）
    #[serde(default)]
    pub proof_of_payment: String,
    /// サブスクリプション期間（日数）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TransactionMetadata {
    pub fn new<S: Into<String>>(proof_of_payment: S) -> Self {
        Self {
            proof_of_payment: proof_of_payment.into(),
            ..Self::default()
        }
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }

    /// JSON文字列に変換する
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// JSON文字列から復元する
    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// 取引（支払い1回分の記録）
///
/// 作成後に変更されるのは `status`、`subscription_id`、`activated_at` のみ。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub subscription_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub metadata: TransactionMetadata,
    /// この取引が台帳に反映された日時（未反映なら None）
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// この取引が台帳に反映済みか
    pub fn is_activated(&self) -> bool {
        self.activated_at.is_some()
    }
}

/// 保留中の取引を記録するための入力
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub plan_id: String,
    pub subscription_id: Option<String>,
    pub payment_type: PaymentType,
    pub amount: f64,
    pub currency: String,
    pub metadata: TransactionMetadata,
}

/// 取引の完了処理の結果
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// 今回の呼び出しで完了にした
    Completed(Transaction),
    /// 既に完了していた
    AlreadyCompleted(Transaction),
}

impl CompletionOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            CompletionOutcome::Completed(tx) | CompletionOutcome::AlreadyCompleted(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            CompletionOutcome::Completed(tx) | CompletionOutcome::AlreadyCompleted(tx) => tx,
        }
    }

    pub fn was_completed_now(&self) -> bool {
        matches!(self, CompletionOutcome::Completed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_status_completes_once() {
        assert_eq!(
            TransactionStatus::Pending.complete().unwrap(),
            TransactionStatus::Completed
        );
        assert!(matches!(
            TransactionStatus::Completed.complete(),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_payment_type_parse() {
        assert_eq!("activation".parse::<PaymentType>().unwrap(), PaymentType::Activation);
        assert_eq!("subscription".parse::<PaymentType>().unwrap(), PaymentType::Subscription);
        assert!("refund".parse::<PaymentType>().is_err());
    }

    #[test]
    fn test_metadata_keeps_unknown_keys() {
        let json = r#"{"proof_of_payment":"uploads/abc.png","duration_days":30,"bank":"GTB"}"#;
        let metadata = TransactionMetadata::from_json(json).unwrap();

        assert_eq!(metadata.proof_of_payment, "uploads/abc.png");
        assert_eq!(metadata.duration_days, Some(30));
        assert_eq!(metadata.extra.get("bank"), Some(&serde_json::json!("GTB")));

        let restored = TransactionMetadata::from_json(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(restored, metadata);
    }

    #[test]
    fn test_metadata_without_duration() {
        let metadata = TransactionMetadata::from_json(r#"{"proof_of_payment":"x"}"#).unwrap();
        assert_eq!(metadata.duration_days, None);
        assert!(metadata.extra.is_empty());
        assert!(!metadata.to_json().unwrap().contains("duration_days"));
    }
}
