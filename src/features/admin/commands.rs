use super::models::{ActivationOutcome, WorkflowState};
use super::workflow;
use crate::features::transactions::{self, CompletionOutcome, Transaction};
use crate::shared::database;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::principal::Principal;
use crate::AppState;
use std::path::{Path, PathBuf};

/// 支払いを確認する
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `principal` - 操作する管理者
/// * `transaction_id` - 取引ID
///
/// # 戻り値
/// 完了処理の結果
pub fn confirm_payment(
    state: &AppState,
    principal: &Principal,
    transaction_id: &str,
) -> AppResult<CompletionOutcome> {
    let db = state.connection()?;
    workflow::confirm_payment(&db, principal, transaction_id)
}

/// 取引をサブスクリプションに反映する
///
/// 更新が0行だった場合は自動で再試行しない。状態を確認してから再実行すること。
pub fn activate(
    state: &AppState,
    principal: &Principal,
    transaction_id: &str,
) -> AppResult<ActivationOutcome> {
    let db = state.connection()?;
    workflow::activate(&db, &state.config, principal, transaction_id)
}

/// 取引のワークフロー状態を取得する
pub fn get_workflow_state(
    state: &AppState,
    principal: &Principal,
    transaction_id: &str,
) -> AppResult<WorkflowState> {
    let db = state.connection()?;
    workflow::workflow_state(&db, principal, transaction_id)
}

/// 確認待ちの取引一覧を取得する
pub fn get_pending_transactions(
    state: &AppState,
    principal: &Principal,
) -> AppResult<Vec<Transaction>> {
    principal.require_admin("get_pending_transactions")?;
    let db = state.connection()?;
    transactions::find_pending(&db)
}

/// データベースのバックアップを作成する（管理者のみ）
///
/// # 戻り値
/// 作成したバックアップファイルのパス
pub fn create_backup(state: &AppState, principal: &Principal) -> AppResult<PathBuf> {
    principal.require_admin("create_backup")?;
    let db = state.connection()?;
    database::create_backup(&db, &state.config.backup_dir())
}

/// バックアップファイルの一覧を取得する（管理者のみ）
pub fn list_backups(state: &AppState, principal: &Principal) -> AppResult<Vec<PathBuf>> {
    principal.require_admin("list_backups")?;
    database::list_backup_files(&state.config.backup_dir())
}

/// バックアップからデータベースを復元する（管理者のみ）
///
/// バックアップ保存先にあるファイルのみ指定できる。
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `principal` - 操作する管理者
/// * `file_name` - `list_backups` が返したファイルの名前
pub fn restore_backup(state: &AppState, principal: &Principal, file_name: &str) -> AppResult<()> {
    principal.require_admin("restore_backup")?;

    // ディレクトリを含む名前は受け付けない
    if Path::new(file_name).file_name().and_then(|name| name.to_str()) != Some(file_name) {
        return Err(AppError::validation(format!(
            "バックアップファイル名が不正です: {file_name}"
        )));
    }
    let backup_path = state.config.backup_dir().join(file_name);

    let mut db = state.connection()?;
    database::restore_from_backup(&mut *db, &backup_path)?;
    log::warn!(
        "管理者がデータベースを復元しました: file={file_name}, admin={}",
        principal.user_id
    );
    Ok(())
}
