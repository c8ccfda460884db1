use crate::features::subscriptions::Subscription;
use crate::features::transactions::Transaction;
use serde::{Deserialize, Serialize};

/// 支払い申請用DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSubmissionDto {
    pub plan_id: String,
    pub amount: f64,
    pub currency: String,
    /// アップロード済みの支払い証明への参照
    pub proof_of_payment: String,
    /// サブスクリプション期間（日数）。有効化料金では使用しない
    #[serde(default)]
    pub duration_days: Option<u32>,
    /// その他の付帯情報（振込元の銀行名など）
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// チェックアウトの結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutReceipt {
    pub subscription: Subscription,
    pub transaction: Transaction,
}
