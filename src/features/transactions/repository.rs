use super::models::{
    CompletionOutcome, NewTransaction, Transaction, TransactionMetadata, TransactionStatus,
};
use crate::features::{plans, subscriptions};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{generate_id, validate_amount, validate_currency, validate_required_field};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const TRANSACTION_COLUMNS: &str = "id, user_id, plan_id, subscription_id, amount, currency, payment_type, status, metadata, activated_at, created_at, updated_at";

fn map_transaction_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let metadata_json: String = row.get(8)?;
    let metadata = TransactionMetadata::from_json(&metadata_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        subscription_id: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        payment_type: row.get(6)?,
        status: row.get(7)?,
        metadata,
        activated_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// 保留中の取引を記録する
///
/// 常に新しい行を作成する（同じ内容の取引が既にあっても重複を検出しない）。
///
/// # 引数
/// * `conn` - データベース接続
/// * `new` - 取引の内容
///
/// # 戻り値
/// 作成された取引
pub fn record_pending(conn: &Connection, new: NewTransaction) -> AppResult<Transaction> {
    validate_required_field(&new.user_id, "ユーザーID")?;
    validate_amount(new.amount)?;
    validate_currency(&new.currency)?;

    plans::repository::find_by_id(conn, &new.plan_id)?;
    if let Some(subscription_id) = &new.subscription_id {
        subscriptions::find_by_id(conn, subscription_id)?;
    }

    let id = generate_id();
    let now = Utc::now();
    let metadata_json = new.metadata.to_json()?;

    conn.execute(
        "INSERT INTO transactions (id, user_id, plan_id, subscription_id, amount, currency, payment_type, status, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            new.user_id,
            new.plan_id,
            new.subscription_id,
            new.amount,
            new.currency,
            new.payment_type,
            TransactionStatus::Pending,
            metadata_json,
            now,
            now,
        ],
    )?;

    log::info!(
        "取引を記録しました: id={id}, user_id={}, plan_id={}, payment_type={}, linked={}",
        new.user_id,
        new.plan_id,
        new.payment_type,
        new.subscription_id.is_some()
    );

    find_by_id(conn, &id)
}

/// 取引を完了にする
///
/// 保留中の場合のみ更新する。既に完了している場合は `AlreadyCompleted` を返す。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 取引ID
///
/// # 戻り値
/// 完了処理の結果、または取引が存在しない場合は NotFound
pub fn mark_completed(conn: &Connection, id: &str) -> AppResult<CompletionOutcome> {
    let current = find_by_id(conn, id)?;
    if current.status == TransactionStatus::Completed {
        log::warn!("取引は既に完了しています: id={id}");
        return Ok(CompletionOutcome::AlreadyCompleted(current));
    }

    let next = current.status.complete()?;
    let rows_affected = conn.execute(
        "UPDATE transactions SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![next, Utc::now(), id, TransactionStatus::Pending],
    )?;

    let updated = find_by_id(conn, id)?;
    if rows_affected == 0 {
        // 読み込み後に別の呼び出しが先に完了させた
        if updated.status == TransactionStatus::Completed {
            log::warn!("取引は並行して完了されました: id={id}");
            return Ok(CompletionOutcome::AlreadyCompleted(updated));
        }
        return Err(AppError::no_rows_affected(format!("取引 {id}")));
    }

    log::info!("取引を完了にしました: id={id}");
    Ok(CompletionOutcome::Completed(updated))
}

/// 取引にサブスクリプションIDを後から紐付ける
///
/// 未設定の場合のみ書き込む。同じIDでの再実行は何もしない。
/// 別のIDが既に設定されている場合は InvalidTransition を返す。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 取引ID
/// * `subscription_id` - 紐付けるサブスクリプションID
///
/// # 戻り値
/// 更新後の取引
pub fn backfill_subscription_id(
    conn: &Connection,
    id: &str,
    subscription_id: &str,
) -> AppResult<Transaction> {
    let current = find_by_id(conn, id)?;

    match current.subscription_id.as_deref() {
        Some(linked) if linked == subscription_id => {
            log::debug!("取引は既に同じサブスクリプションに紐付いています: id={id}");
            return Ok(current);
        }
        Some(linked) => {
            log::warn!(
                "取引の紐付け先の変更を拒否しました: id={id}, linked={linked}, requested={subscription_id}"
            );
            return Err(AppError::invalid_transition(format!(
                "取引 {id} は既に別のサブスクリプションに紐付いています"
            )));
        }
        None => {}
    }

    subscriptions::find_by_id(conn, subscription_id)?;

    let rows_affected = conn.execute(
        "UPDATE transactions SET subscription_id = ?1, updated_at = ?2
         WHERE id = ?3 AND subscription_id IS NULL",
        params![subscription_id, Utc::now(), id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::no_rows_affected(format!("取引 {id}")));
    }

    log::info!("取引にサブスクリプションを紐付けました: id={id}, subscription_id={subscription_id}");
    find_by_id(conn, id)
}

/// 取引を台帳に反映済みとして記録する
///
/// 反映日時が未設定の場合のみ書き込む。同じ取引の二回目の反映はここで検出される。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 取引ID
///
/// # 戻り値
/// 更新後の取引、既に反映済みの場合は InvalidTransition、更新が0行の場合は NoRowsAffected
pub fn mark_activated(conn: &Connection, id: &str) -> AppResult<Transaction> {
    let current = find_by_id(conn, id)?;
    if current.is_activated() {
        return Err(AppError::invalid_transition(format!(
            "取引 {id} は既に反映済みです"
        )));
    }

    let now = Utc::now();
    let rows_affected = conn.execute(
        "UPDATE transactions SET activated_at = ?1, updated_at = ?2
         WHERE id = ?3 AND activated_at IS NULL",
        params![now, now, id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::no_rows_affected(format!("取引 {id}")));
    }

    log::info!("取引を反映済みにしました: id={id}");
    find_by_id(conn, id)
}

/// IDで取引を取得する
pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Transaction> {
    conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
        params![id],
        map_transaction_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(format!("取引 {id}")))
}

/// 保留中の取引を古い順に取得する（管理者の確認待ち一覧）
pub fn find_pending(conn: &Connection) -> AppResult<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions
         WHERE status = ?1 ORDER BY created_at ASC, rowid ASC"
    ))?;

    let transactions = stmt.query_map(params![TransactionStatus::Pending], map_transaction_row)?;
    transactions
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
}

/// ユーザーの取引履歴を新しい順に取得する
pub fn find_all_for_user(conn: &Connection, user_id: &str) -> AppResult<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions
         WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
    ))?;

    let transactions = stmt.query_map(params![user_id], map_transaction_row)?;
    transactions
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
}
