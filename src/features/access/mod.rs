/// 閲覧可否の判定
///
/// `evaluator` は副作用のない判定関数、`service` はデータベースから判定対象を読み込む。
pub mod commands;
pub mod evaluator;
pub mod service;

pub use evaluator::{
    evaluate, AccessDecision, AccessReason, ActivationRule, CORRECT_SCORE_PLAN_SLUG,
};
pub use service::governing_subscription;
