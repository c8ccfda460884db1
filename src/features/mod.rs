/// 機能別モジュール
///
/// 各機能モジュールは、その機能に関連するコード（モデル、コマンド、データベース操作、サービス）
/// を含む自己完結型のユニットです。
pub mod access;
pub mod admin;
pub mod checkout;
pub mod plans;
pub mod reconciliation;
pub mod subscriptions;
pub mod transactions;
