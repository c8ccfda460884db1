use thiserror::Error;

/// 課金コア全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// データベース関連のエラー
    #[error("データベースエラー: {0}")]
    Database(String),

    /// バリデーション関連のエラー
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 参照されたIDのリソースが存在しない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 更新対象は存在するが、条件付き更新で1行も変更されなかった
    #[error("更新された行がありません: {0}")]
    NoRowsAffected(String),

    /// 照合処理がすべての検索戦略を使い切った
    #[error("取引 {transaction_id} に対応するサブスクリプションが見つかりません")]
    SubscriptionNotFound { transaction_id: String },

    /// データストアに到達できない、またはビジー状態
    #[error("データストアを利用できません: {0}")]
    UpstreamUnavailable(String),

    /// 状態遷移の規則に違反する操作
    #[error("不正な状態遷移: {0}")]
    InvalidTransition(String),

    /// 権限が不足している
    #[error("権限エラー: {0}")]
    Unauthorized(String),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    /// 並行処理関連のエラー
    #[error("並行処理エラー: {0}")]
    Concurrency(String),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（データストアの一時的エラーなど）
    Medium,
    /// 高重要度（データベースエラーなど）
    High,
    /// 最重要（手動調査が必要なデータ不整合など）
    Critical,
}

/// エンドユーザーに表示する汎用メッセージ
const GENERIC_USER_MESSAGE: &str = "問題が発生しました。しばらくしてからもう一度お試しください";

impl AppError {
    /// エンドユーザーに表示するためのメッセージを取得
    ///
    /// バリデーションエラー以外は種類を明かさず汎用メッセージを返す。
    ///
    /// # 戻り値
    /// ユーザーに表示可能なエラーメッセージ
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Validation(msg) => msg,
            AppError::Unauthorized(_) => "この操作を行う権限がありません",
            _ => GENERIC_USER_MESSAGE,
        }
    }

    /// 管理者に表示するためのメッセージを取得
    ///
    /// 管理者が再試行するかデータを直接調査するかを判断できるよう、
    /// エラーの種類を明示する。
    ///
    /// # 戻り値
    /// エラー種別を含むメッセージ
    pub fn admin_message(&self) -> String {
        match self {
            AppError::NoRowsAffected(detail) => {
                format!("有効化に失敗しました（更新された行は0件です）: {detail}")
            }
            AppError::SubscriptionNotFound { transaction_id } => format!(
                "取引 {transaction_id} のサブスクリプションを特定できませんでした。データベースを直接確認してください"
            ),
            AppError::UpstreamUnavailable(detail) => format!(
                "データストアに接続できません。状態を再確認してから再試行してください: {detail}"
            ),
            _ => self.details(),
        }
    }

    /// エラーの詳細情報を取得
    ///
    /// # 戻り値
    /// エラーの詳細情報（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    ///
    /// # 戻り値
    /// エラーの重要度レベル
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Database(_) => ErrorSeverity::High,
            AppError::Validation(_) => ErrorSeverity::Low,
            AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::NoRowsAffected(_) => ErrorSeverity::High,
            AppError::SubscriptionNotFound { .. } => ErrorSeverity::Critical,
            AppError::UpstreamUnavailable(_) => ErrorSeverity::Medium,
            AppError::InvalidTransition(_) => ErrorSeverity::Low,
            AppError::Unauthorized(_) => ErrorSeverity::Critical,
            AppError::Configuration(_) => ErrorSeverity::High,
            AppError::Io(_) => ErrorSeverity::Medium,
            AppError::Json(_) => ErrorSeverity::Medium,
            AppError::Concurrency(_) => ErrorSeverity::High,
        }
    }

    /// 読み取り処理であれば安全に再試行できるエラーかどうか
    ///
    /// 変更系の処理は、部分的に適用されている可能性があるため
    /// 状態を再読み込みしてから再試行すること。
    pub fn is_retryable_read(&self) -> bool {
        matches!(self, AppError::UpstreamUnavailable(_))
    }

    /// バリデーションエラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `message` - バリデーションエラーメッセージ
    ///
    /// # 戻り値
    /// バリデーションエラー
    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// リソース未発見エラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `resource` - 見つからなかったリソース名
    ///
    /// # 戻り値
    /// リソース未発見エラー
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    /// 0行更新エラーを作成するヘルパー関数
    pub fn no_rows_affected<S: Into<String>>(message: S) -> Self {
        AppError::NoRowsAffected(message.into())
    }

    /// 不正な状態遷移エラーを作成するヘルパー関数
    pub fn invalid_transition<S: Into<String>>(message: S) -> Self {
        AppError::InvalidTransition(message.into())
    }

    /// 権限エラーを作成するヘルパー関数
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        AppError::Unauthorized(message.into())
    }

    /// 設定エラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `message` - 設定エラーメッセージ
    ///
    /// # 戻り値
    /// 設定エラー
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }

    /// 並行処理エラーを作成するヘルパー関数
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        AppError::Concurrency(message.into())
    }
}

/// AppErrorからStringへの変換（呼び出し側の画面表示用）
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.user_message().to_string()
    }
}

/// rusqlite::ErrorからAppErrorへの変換
///
/// ビジー・ロック・オープン失敗は到達不能として扱い、それ以外はデータベースエラーとする。
impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::CannotOpen
                ) =>
            {
                AppError::UpstreamUnavailable(error.to_string())
            }
            _ => AppError::Database(error.to_string()),
        }
    }
}

/// Result型のエイリアス（クレート全体で使用）
pub type AppResult<T> = Result<T, AppError>;
