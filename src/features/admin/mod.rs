/// 管理者による支払い確認ワークフロー
///
/// 支払いの確認（取引の完了）と有効化（台帳への反映）は別々の操作として提供する。
/// どちらも管理者の利用者のみ実行できる。
pub mod commands;
pub mod models;
pub mod workflow;

pub use models::{ActivationOutcome, WorkflowState};
pub use workflow::{activate, confirm_payment, workflow_state};
