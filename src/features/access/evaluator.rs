use crate::features::plans::{repository::normalize_slug, Plan};
use crate::features::subscriptions::{Subscription, SubscriptionStatus};
use serde::Serialize;
use std::fmt;

/// 常に有効化料金を必要とするプランのスラッグ
pub const CORRECT_SCORE_PLAN_SLUG: &str = "correct-score";

/// 有効化料金が必要になる理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationRule {
    /// プランの `requires_activation` フラグ
    PlanFlag,
    /// correct-score プランは設定に関わらず有効化料金を必要とする
    ///
    /// プラン側のフラグと情報が重複している。プランの設定で表現できるなら削除してよい。
    CorrectScoreOverride,
}

impl ActivationRule {
    /// プランに適用される有効化ルールを返す
    ///
    /// # 戻り値
    /// 有効化料金が不要な場合は None
    pub fn for_plan(plan: &Plan) -> Option<ActivationRule> {
        if plan.requires_activation {
            Some(ActivationRule::PlanFlag)
        } else if normalize_slug(&plan.slug) == CORRECT_SCORE_PLAN_SLUG {
            Some(ActivationRule::CorrectScoreOverride)
        } else {
            None
        }
    }
}

/// 閲覧可否の理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessReason {
    /// 閲覧可能
    Unlocked,
    /// サブスクリプションがない（購読を促す）
    NoSubscription,
    /// 有効ではない
    Inactive { status: SubscriptionStatus },
    /// 有効だが有効化料金が未払い（有効化料金の支払いを促す）
    ActivationFeeRequired { rule: ActivationRule },
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessReason::Unlocked => f.write_str("unlocked"),
            AccessReason::NoSubscription => f.write_str("no subscription"),
            AccessReason::Inactive { status } => write!(f, "status={status}"),
            AccessReason::ActivationFeeRequired { .. } => f.write_str("activation fee required"),
        }
    }
}

/// 閲覧可否の判定結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub unlocked: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn locked(reason: AccessReason) -> Self {
        Self {
            unlocked: false,
            reason,
        }
    }

    /// 有効化料金の支払いを促すべきか
    pub fn requires_activation_fee(&self) -> bool {
        matches!(self.reason, AccessReason::ActivationFeeRequired { .. })
    }
}

/// プレミアムコンテンツの閲覧可否を判定する
///
/// 副作用はない。ページ表示のたびに呼び出してよい。
///
/// # 引数
/// * `subscription` - 対象のサブスクリプション（存在しない場合は None）
/// * `plan` - 対象のプラン
///
/// # 戻り値
/// 判定結果
pub fn evaluate(subscription: Option<&Subscription>, plan: &Plan) -> AccessDecision {
    let Some(subscription) = subscription else {
        return AccessDecision::locked(AccessReason::NoSubscription);
    };

    if subscription.status != SubscriptionStatus::Active {
        return AccessDecision::locked(AccessReason::Inactive {
            status: subscription.status,
        });
    }

    if let Some(rule) = ActivationRule::for_plan(plan) {
        if !subscription.activation_fee_paid {
            return AccessDecision::locked(AccessReason::ActivationFeeRequired { rule });
        }
    }

    AccessDecision {
        unlocked: true,
        reason: AccessReason::Unlocked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quickcheck_macros::quickcheck;

    fn plan(slug: &str, requires_activation: bool) -> Plan {
        let now = Utc::now();
        Plan {
            id: "plan-1".to_string(),
            slug: slug.to_string(),
            name: slug.to_string(),
            requires_activation,
            max_predictions_per_day: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn subscription(status: SubscriptionStatus, activation_fee_paid: bool) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: "sub-1".to_string(),
            user_id: "user-1".to_string(),
            plan_id: "plan-1".to_string(),
            status,
            subscription_fee_paid: true,
            activation_fee_paid,
            start_date: Some(now),
            expiry_date: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_no_subscription() {
        let decision = evaluate(None, &plan("daily", false));
        assert!(!decision.unlocked);
        assert_eq!(decision.reason, AccessReason::NoSubscription);
        assert_eq!(decision.reason.to_string(), "no subscription");
    }

    #[test]
    fn test_inactive_status_reason() {
        let sub = subscription(SubscriptionStatus::PendingActivation, true);
        let decision = evaluate(Some(&sub), &plan("daily", false));
        assert!(!decision.unlocked);
        assert_eq!(decision.reason.to_string(), "status=pending_activation");
    }

    #[test]
    fn test_activation_fee_required_is_distinct() {
        let sub = subscription(SubscriptionStatus::Active, false);
        let decision = evaluate(Some(&sub), &plan("profit-multiplier", true));

        assert!(!decision.unlocked);
        assert!(decision.requires_activation_fee());
        assert_eq!(decision.reason.to_string(), "activation fee required");
        assert_ne!(decision.reason, AccessReason::NoSubscription);
    }

    #[test]
    fn test_correct_score_always_requires_activation() {
        let sub = subscription(SubscriptionStatus::Active, false);
        let decision = evaluate(Some(&sub), &plan("Correct-Score", false));

        assert_eq!(
            decision.reason,
            AccessReason::ActivationFeeRequired {
                rule: ActivationRule::CorrectScoreOverride
            }
        );

        let paid = subscription(SubscriptionStatus::Active, true);
        assert!(evaluate(Some(&paid), &plan("correct-score", false)).unlocked);
    }

    #[test]
    fn test_plan_flag_takes_precedence_over_override() {
        let p = plan("correct-score", true);
        assert_eq!(ActivationRule::for_plan(&p), Some(ActivationRule::PlanFlag));
        assert_eq!(ActivationRule::for_plan(&plan("daily", false)), None);
    }

    #[quickcheck]
    fn prop_unpaid_activation_is_locked(slug: String) -> bool {
        let sub = subscription(SubscriptionStatus::Active, false);
        let decision = evaluate(Some(&sub), &plan(&slug, true));
        !decision.unlocked && decision.reason.to_string() == "activation fee required"
    }

    #[quickcheck]
    fn prop_paid_or_not_required_is_unlocked(requires_activation: bool, fee_paid: bool) -> bool {
        let sub = subscription(SubscriptionStatus::Active, fee_paid);
        let decision = evaluate(Some(&sub), &plan("daily-banker", requires_activation));
        let expected = fee_paid || !requires_activation;
        decision.unlocked == expected
    }

    #[quickcheck]
    fn prop_non_active_is_never_unlocked(in_activation: bool, fee_paid: bool, requires: bool) -> bool {
        let status = if in_activation {
            SubscriptionStatus::PendingActivation
        } else {
            SubscriptionStatus::Pending
        };
        let sub = subscription(status, fee_paid);
        !evaluate(Some(&sub), &plan("daily", requires)).unlocked
    }
}
