use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 認証済み利用者の役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 一般ユーザー
    Member,
    /// 管理者
    Admin,
}

/// 認証済みの利用者
///
/// 認証層で確定した値を、各操作に明示的に引き渡す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// ユーザーID（認証基盤が発行する不透明な文字列）
    pub user_id: String,
    /// 役割
    pub role: Role,
}

impl Principal {
    /// 一般ユーザーの利用者を作成
    pub fn member<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Member,
        }
    }

    /// 管理者の利用者を作成
    pub fn admin<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    /// 管理者かどうか
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 管理者であることを要求する
    ///
    /// # 引数
    /// * `action` - 実行しようとしている操作名（ログ用）
    ///
    /// # 戻り値
    /// 管理者の場合はOk(())、それ以外は権限エラー
    pub fn require_admin(&self, action: &str) -> AppResult<()> {
        if self.is_admin() {
            return Ok(());
        }

        log::warn!(
            "管理者以外による操作を拒否しました: action={action}, user_id={}",
            self.user_id
        );
        Err(AppError::unauthorized(format!(
            "{action} は管理者のみ実行できます"
        )))
    }

    /// ユーザーIDが空でないことを確認する
    pub fn require_identified(&self) -> AppResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::unauthorized("ユーザーIDが指定されていません"));
        }
        Ok(())
    }
}
