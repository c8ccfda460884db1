use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// プラン（購入可能なコンテンツ階層）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Plan {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// サブスクリプション料金とは別に有効化料金が必要か
    pub requires_activation: bool,
    /// 1日あたりの予想表示上限（None は無制限）
    pub max_predictions_per_day: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// プラン作成用DTO
#[derive(Debug, Deserialize, Clone)]
pub struct CreatePlanDto {
    pub slug: String,
    pub name: String,
    pub requires_activation: bool,
    pub max_predictions_per_day: Option<u32>,
}

/// プラン更新用DTO
#[derive(Debug, Deserialize, Default, Clone)]
pub struct UpdatePlanDto {
    pub name: Option<String>,
    pub requires_activation: Option<bool>,
    /// `Some(None)` で上限を解除する
    pub max_predictions_per_day: Option<Option<u32>>,
}
