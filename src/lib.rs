pub mod features;
pub mod shared;

use log::{error, info};
use rusqlite::Connection;
use shared::config::{initialize_logging_system, load_environment_variables, BillingConfig};
use shared::database::{initialize_database, initialize_in_memory_database};
use shared::errors::{AppError, AppResult};
use std::sync::{Mutex, MutexGuard};

/// アプリケーション状態（データベース接続と設定を保持）
pub struct AppState {
    pub db: Mutex<Connection>,
    pub config: BillingConfig,
}

impl AppState {
    /// 既存の接続から状態を作成する
    pub fn new(conn: Connection, config: BillingConfig) -> Self {
        Self {
            db: Mutex::new(conn),
            config,
        }
    }

    /// メモリ上のデータベースで状態を作成する
    pub fn in_memory() -> AppResult<Self> {
        Ok(Self::new(
            initialize_in_memory_database()?,
            BillingConfig::default(),
        ))
    }

    /// データベース接続のロックを取得する
    ///
    /// # 戻り値
    /// ロック済みの接続、またはロックが破損している場合は並行処理エラー
    pub fn connection(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))
    }
}

/// 課金コアを初期化する
///
/// # 処理内容
/// 1. 環境変数ファイルを読み込む
/// 2. ログシステムを初期化する
/// 3. 設定を読み込み、データベースを初期化する
///
/// # 戻り値
/// アプリケーション状態
pub fn initialize() -> AppResult<AppState> {
    load_environment_variables();
    initialize_logging_system();

    info!("課金コアの初期化を開始します...");

    let config = BillingConfig::from_env().map_err(|e| {
        error!("設定の読み込みに失敗しました: {e}");
        e
    })?;

    let conn = initialize_database(&config).map_err(|e| {
        error!("データベースの初期化に失敗しました: {e}");
        e
    })?;

    info!(
        "課金コアの初期化が完了しました: database_path={}, default_subscription_days={}",
        config.database_path, config.default_subscription_days
    );

    Ok(AppState::new(conn, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_in_memory_state_has_schema() {
        let state = AppState::in_memory().unwrap();
        let db = state.connection().unwrap();
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM subscriptions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_poisoned_lock_is_concurrency_error() {
        let state = Arc::new(AppState::in_memory().unwrap());
        let poisoner = Arc::clone(&state);

        let _ = std::thread::spawn(move || {
            let _guard = poisoner.db.lock().unwrap();
            panic!("ロックを保持したままパニック");
        })
        .join();

        assert!(matches!(state.connection(), Err(AppError::Concurrency(_))));
    }
}
