use crate::shared::errors::{AppError, AppResult};

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: String,
    /// デバッグモードの有効/無効
    pub debug_mode: bool,
    /// ログレベル
    pub log_level: String,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    ///
    /// # 戻り値
    /// 環境設定
    pub fn from_env() -> Self {
        let environment = get_environment();
        let debug_mode = environment == Environment::Development;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if debug_mode {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        Self {
            environment: format!("{environment:?}").to_lowercase(),
            debug_mode,
            log_level,
        }
    }
}

/// 課金コアの動作設定
#[derive(Debug, Clone, PartialEq)]
pub struct BillingConfig {
    /// SQLiteデータベースファイルのパス
    pub database_path: String,
    /// 取引メタデータに期間がない場合のサブスクリプション日数
    pub default_subscription_days: u32,
    /// 有効化料金の支払い時に有効期間が未設定だった場合の日数
    pub activation_fallback_days: u32,
    /// ロック競合時にSQLiteが待機する時間（ミリ秒）
    pub busy_timeout_ms: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            database_path: get_database_filename(get_environment()).to_string(),
            default_subscription_days: 30,
            activation_fallback_days: 30,
            busy_timeout_ms: 5_000,
        }
    }
}

impl BillingConfig {
    /// 環境変数から課金設定を読み込む
    ///
    /// # 戻り値
    /// 課金設定、または数値の形式が不正な場合はエラー
    ///
    /// # 参照する環境変数
    /// - `DATABASE_PATH`
    /// - `DEFAULT_SUBSCRIPTION_DAYS`
    /// - `ACTIVATION_FALLBACK_DAYS`
    /// - `DB_BUSY_TIMEOUT_MS`
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| {
            log::debug!(
                "DATABASE_PATH が設定されていないため、デフォルト値を使用: {}",
                defaults.database_path
            );
            defaults.database_path.clone()
        });

        let config = Self {
            database_path,
            default_subscription_days: read_number(
                "DEFAULT_SUBSCRIPTION_DAYS",
                defaults.default_subscription_days,
            )?,
            activation_fallback_days: read_number(
                "ACTIVATION_FALLBACK_DAYS",
                defaults.activation_fallback_days,
            )?,
            busy_timeout_ms: read_number("DB_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// バックアップファイルの保存先（データベースファイルと同じ場所の `backups`）
    pub fn backup_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.database_path)
            .parent()
            .map(|parent| parent.join("backups"))
            .unwrap_or_else(|| std::path::PathBuf::from("backups"))
    }

    /// 設定を検証する
    pub fn validate(&self) -> AppResult<()> {
        if self.database_path.trim().is_empty() {
            return Err(AppError::configuration("DATABASE_PATH が空です"));
        }
        if self.default_subscription_days == 0 {
            return Err(AppError::configuration(
                "DEFAULT_SUBSCRIPTION_DAYS は1以上である必要があります",
            ));
        }
        if self.activation_fallback_days == 0 {
            return Err(AppError::configuration(
                "ACTIVATION_FALLBACK_DAYS は1以上である必要があります",
            ));
        }
        Ok(())
    }
}

/// 数値の環境変数を読み込む（未設定ならデフォルト値）
fn read_number<T>(key: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            AppError::configuration(format!("{key} の値が数値として不正です: {raw}"))
        }),
        Err(_) => {
            log::debug!("{key} が設定されていないため、デフォルト値を使用: {default}");
            Ok(default)
        }
    }
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = match env_var.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_billing.db"
/// - プロダクション環境: "billing.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_billing.db",
        Environment::Production => "billing.db",
    }
}

/// 環境に応じた.envファイルを読み込む
pub fn load_environment_variables() {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    let env_file = match environment.as_str() {
        "production" => ".env.production",
        _ => ".env",
    };

    log::info!("環境: {environment}, 読み込み対象: {env_file}");

    match dotenv::from_filename(env_file) {
        Ok(_) => {
            log::info!("{env_file}ファイルを読み込みました");
        }
        Err(_) => {
            // 環境固有のファイルがない場合は、デフォルトの.envを試行
            if env_file != ".env" && dotenv::dotenv().is_ok() {
                log::warn!("{env_file}が見つからないため、デフォルトの.envファイルを読み込みました");
            } else {
                log::warn!("環境変数ファイルが見つかりません。直接設定された環境変数を使用します。");
            }
        }
    }
}

/// ログシステムを初期化する
///
/// 二回目以降の呼び出しは無視される。
pub fn initialize_logging_system() {
    let env_config = EnvironmentConfig::from_env();

    let log_level = match env_config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    let initialized = env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .is_ok();

    if initialized {
        log::info!(
            "ログシステムを初期化しました: level={}, environment={}, debug_mode={}",
            env_config.log_level,
            env_config.environment,
            env_config.debug_mode
        );
    }
}
