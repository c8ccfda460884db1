use crate::shared::errors::{AppError, AppResult};
use chrono::Utc;
use rusqlite::backup::Backup;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BACKUP_FILE_PREFIX: &str = "billing_backup_";

/// 1ステップでコピーするページ数
const PAGES_PER_STEP: std::os::raw::c_int = 5;

/// データベースのバックアップを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `backup_dir` - バックアップファイルを置くディレクトリ
///
/// # 戻り値
/// 作成したバックアップファイルのパス
pub fn create_backup(conn: &Connection, backup_dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(backup_dir)?;

    let file_name = format!(
        "{BACKUP_FILE_PREFIX}{}.db",
        Utc::now().format("%Y%m%d_%H%M%S_%6f")
    );
    let backup_path = backup_dir.join(file_name);

    let mut backup_conn = Connection::open(&backup_path)?;
    let backup = Backup::new(conn, &mut backup_conn)?;
    backup.run_to_completion(PAGES_PER_STEP, Duration::from_millis(250), None)?;

    log::info!("データベースのバックアップを作成しました: {:?}", backup_path);
    Ok(backup_path)
}

/// バックアップからデータベースを復元する
///
/// # 引数
/// * `conn` - 復元先のデータベース接続
/// * `backup_path` - バックアップファイルのパス
pub fn restore_from_backup(conn: &mut Connection, backup_path: &Path) -> AppResult<()> {
    if !backup_path.exists() {
        return Err(AppError::not_found(format!(
            "バックアップファイル {}",
            backup_path.display()
        )));
    }

    let backup_conn = Connection::open(backup_path)?;
    let backup = Backup::new(&backup_conn, conn)?;
    backup.run_to_completion(PAGES_PER_STEP, Duration::from_millis(250), None)?;

    log::warn!("バックアップからデータベースを復元しました: {:?}", backup_path);
    Ok(())
}

/// バックアップファイルの一覧を取得する（新しい順）
pub fn list_backup_files(backup_dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut backup_files = Vec::new();

    if let Ok(entries) = std::fs::read_dir(backup_dir) {
        for entry in entries.flatten() {
            if let Some(file_name) = entry.file_name().to_str() {
                if file_name.starts_with(BACKUP_FILE_PREFIX) && file_name.ends_with(".db") {
                    backup_files.push(entry.path());
                }
            }
        }
    }

    // ファイル名に作成日時が入っているので名前の降順が新しい順になる
    backup_files.sort_by(|a, b| b.cmp(a));
    Ok(backup_files)
}
