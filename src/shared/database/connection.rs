use crate::shared::config::BillingConfig;
use crate::shared::errors::AppResult;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// データベース接続を開き、スキーマを作成する
///
/// # 引数
/// * `config` - 課金設定（パスとビジータイムアウトを使用）
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. データベースファイルを開く
/// 2. 接続オプション（外部キー、ビジータイムアウト）を設定
/// 3. テーブルとインデックスを作成
pub fn initialize_database(config: &BillingConfig) -> AppResult<Connection> {
    let path = Path::new(&config.database_path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            log::info!("データベースディレクトリを作成: {:?}", parent);
        }
    }

    let conn = Connection::open(path)?;
    configure_connection(&conn, config.busy_timeout_ms)?;
    create_tables(&conn)?;

    log::info!("データベースを初期化しました: {:?}", path);

    Ok(conn)
}

/// メモリ上にデータベースを作成する（テストや一時利用向け）
pub fn initialize_in_memory_database() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn, BillingConfig::default().busy_timeout_ms)?;
    create_tables(&conn)?;
    Ok(conn)
}

/// 接続単位のオプションを設定する
fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> AppResult<()> {
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// データベーステーブルを作成する
///
/// 既存のテーブルがある場合は何もしない。
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    create_plans_table(conn)?;
    create_subscriptions_table(conn)?;
    create_transactions_table(conn)?;
    create_indexes(conn)?;
    Ok(())
}

/// プランテーブルを作成する
fn create_plans_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS plans (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            requires_activation INTEGER NOT NULL DEFAULT 0,
            max_predictions_per_day INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// サブスクリプションテーブルを作成する
fn create_subscriptions_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            plan_id TEXT NOT NULL REFERENCES plans(id),
            status TEXT NOT NULL CHECK(status IN ('pending', 'pending_activation', 'active')),
            subscription_fee_paid INTEGER NOT NULL DEFAULT 0,
            activation_fee_paid INTEGER NOT NULL DEFAULT 0,
            start_date TEXT,
            expiry_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// 取引テーブルを作成する
fn create_transactions_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            plan_id TEXT NOT NULL REFERENCES plans(id),
            subscription_id TEXT REFERENCES subscriptions(id),
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            payment_type TEXT NOT NULL CHECK(payment_type IN ('subscription', 'activation')),
            status TEXT NOT NULL CHECK(status IN ('pending', 'completed')),
            metadata TEXT NOT NULL DEFAULT '{}',
            activated_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // 反映日時の列がない古いファイルには後から追加する
    if !column_exists(conn, "transactions", "activated_at")? {
        conn.execute("ALTER TABLE transactions ADD COLUMN activated_at TEXT", [])?;
        log::info!("transactions テーブルに activated_at 列を追加しました");
    }
    Ok(())
}

/// テーブルに指定した列が存在するか
fn column_exists(conn: &Connection, table_name: &str, column_name: &str) -> AppResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table_name})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns.iter().any(|name| name == column_name))
}

/// インデックスを作成する
fn create_indexes(conn: &Connection) -> AppResult<()> {
    // 照合処理の (user_id, plan_id) 検索用
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_user_plan
         ON subscriptions(user_id, plan_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();

        let result = create_tables(&conn);
        assert!(result.is_ok());

        let tables = ["plans", "subscriptions", "transactions"];
        for table in &tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "テーブル {table} が作成されていません");
        }
    }

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        assert!(create_tables(&conn).is_ok());
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = initialize_in_memory_database().unwrap();
        conn.execute(
            "INSERT INTO plans (id, slug, name, created_at, updated_at)
             VALUES ('p1', 'basic', 'Basic', '2024-01-01', '2024-01-01')",
            [],
        )
        .unwrap();

        // 定義外のステータスは拒否される
        let result = conn.execute(
            "INSERT INTO subscriptions (id, user_id, plan_id, status, created_at, updated_at)
             VALUES ('s1', 'u1', 'p1', 'cancelled', '2024-01-01', '2024-01-01')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_initialize_database_creates_parent_directory() {
        let temp_dir = TempDir::new().expect("一時ディレクトリの作成に失敗");
        let db_path = temp_dir.path().join("nested").join("billing.db");
        let config = BillingConfig {
            database_path: db_path.to_string_lossy().to_string(),
            ..BillingConfig::default()
        };

        let conn = initialize_database(&config).expect("データベースの初期化に失敗");
        assert!(db_path.exists());

        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn test_create_tables_adds_activated_at_to_old_transactions_table() {
        let conn = Connection::open_in_memory().unwrap();
        create_plans_table(&conn).unwrap();
        create_subscriptions_table(&conn).unwrap();
        conn.execute(
            "CREATE TABLE transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                plan_id TEXT NOT NULL REFERENCES plans(id),
                subscription_id TEXT REFERENCES subscriptions(id),
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                payment_type TEXT NOT NULL,
                status TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .unwrap();
        assert!(!column_exists(&conn, "transactions", "activated_at").unwrap());

        create_tables(&conn).unwrap();
        assert!(column_exists(&conn, "transactions", "activated_at").unwrap());

        // 二回目は何もしない
        assert!(create_tables(&conn).is_ok());
    }
}
