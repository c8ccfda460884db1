use super::models::{LedgerOutcome, Subscription, SubscriptionStatus};
use crate::features::plans;
use crate::shared::database::run_in_transaction;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::generate_id;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, subscription_fee_paid, activation_fee_paid, start_date, expiry_date, created_at, updated_at";

fn map_subscription_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        status: row.get(3)?,
        subscription_fee_paid: row.get::<_, i64>(4)? != 0,
        activation_fee_paid: row.get::<_, i64>(5)? != 0,
        start_date: row.get(6)?,
        expiry_date: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// IDでサブスクリプションを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// サブスクリプション、または存在しない場合は NotFound
pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Subscription> {
    find_optional_by_id(conn, id)?
        .ok_or_else(|| AppError::not_found(format!("サブスクリプション {id}")))
}

/// IDでサブスクリプションを取得する（存在しない場合は None）
pub fn find_optional_by_id(conn: &Connection, id: &str) -> AppResult<Option<Subscription>> {
    let subscription = conn
        .query_row(
            &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
            params![id],
            map_subscription_row,
        )
        .optional()?;
    Ok(subscription)
}

/// (ユーザー, プラン) の最新のサブスクリプションを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_id` - ユーザーID
/// * `plan_id` - プランID
/// * `statuses` - 状態での絞り込み（None の場合は全状態）
///
/// # 戻り値
/// 作成日時の新しい順で先頭の1件
pub fn find_latest_for_user_plan(
    conn: &Connection,
    user_id: &str,
    plan_id: &str,
    statuses: Option<&[SubscriptionStatus]>,
) -> AppResult<Option<Subscription>> {
    let mut values: Vec<String> = vec![user_id.to_string(), plan_id.to_string()];
    let mut query = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?1 AND plan_id = ?2"
    );

    if let Some(statuses) = statuses {
        if statuses.is_empty() {
            return Ok(None);
        }
        let placeholders: Vec<String> = statuses
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 3))
            .collect();
        query.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
        values.extend(statuses.iter().map(|s| s.as_str().to_string()));
    }

    // 同時刻の場合は後から挿入された行を優先する
    query.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT 1");

    let subscription = conn
        .query_row(&query, params_from_iter(values.iter()), map_subscription_row)
        .optional()?;
    Ok(subscription)
}

/// ユーザーのサブスクリプション一覧を取得する（新しい順）
pub fn find_all_for_user(conn: &Connection, user_id: &str) -> AppResult<Vec<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
    ))?;
    let subscriptions = stmt.query_map(params![user_id], map_subscription_row)?;

    subscriptions
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
}

/// 保留中のサブスクリプションを取得する。存在しなければ作成する
///
/// (ユーザー, プラン) に既存の行があれば変更せずに返す。
/// 作成された場合と既存の行が返された場合は、呼び出し側で同じ結果として扱ってよい。
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_id` - ユーザーID
/// * `plan_id` - プランID
///
/// # 戻り値
/// サブスクリプション、またはプランが存在しない場合は NotFound
pub fn create_or_fetch_pending(
    conn: &Connection,
    user_id: &str,
    plan_id: &str,
) -> AppResult<Subscription> {
    // 確認と作成の間に他の書き込みが入らないよう、書き込みロックを先に取得する
    run_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        plans::repository::find_by_id(tx, plan_id)?;

        if let Some(existing) = find_latest_for_user_plan(tx, user_id, plan_id, None)? {
            log::debug!(
                "既存のサブスクリプションを返します: id={}, user_id={user_id}, plan_id={plan_id}, status={}",
                existing.id,
                existing.status
            );
            return Ok(existing);
        }

        let id = generate_id();
        let now = Utc::now();

        tx.execute(
            "INSERT INTO subscriptions (id, user_id, plan_id, status, subscription_fee_paid, activation_fee_paid, start_date, expiry_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, 0, NULL, NULL, ?5, ?6)",
            params![id, user_id, plan_id, SubscriptionStatus::Pending, now, now],
        )?;

        log::info!("保留中のサブスクリプションを作成しました: id={id}, user_id={user_id}, plan_id={plan_id}");
        find_by_id(tx, &id)
    })
}

/// サブスクリプション料金の支払いを反映する
///
/// `subscription_fee_paid=true`, `status=active`, 開始日=現在, 終了日=現在+`duration_days` を設定する。
/// 既に有効な行でも有効期間を書き換える（更新のたびに新しい支払いが反映される）。
/// 同じ支払いを二度反映しないための判定は取引側の `activated_at` で行う。
///
/// # 戻り値
/// 変更結果（常に `Applied`）、行が存在しない場合は NotFound、条件付き更新が0行の場合は NoRowsAffected
pub fn apply_subscription_activation(
    conn: &Connection,
    subscription_id: &str,
    duration_days: u32,
) -> AppResult<LedgerOutcome> {
    if duration_days == 0 {
        return Err(AppError::validation("有効日数は1日以上である必要があります"));
    }

    run_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let current = find_by_id(tx, subscription_id)?;
        current.status.validate_transition(&SubscriptionStatus::Active)?;

        let now = Utc::now();
        let expiry = now + Duration::days(i64::from(duration_days));
        let renewal = current.status == SubscriptionStatus::Active && current.subscription_fee_paid;

        compare_and_swap(
            tx,
            &current,
            LedgerWrite {
                status: SubscriptionStatus::Active,
                subscription_fee_paid: true,
                activation_fee_paid: current.activation_fee_paid,
                start_date: now,
                expiry_date: expiry,
                updated_at: now,
            },
        )?;

        log::info!(
            "サブスクリプションを有効化しました: id={subscription_id}, duration_days={duration_days}, expiry_date={expiry}, renewal={renewal}"
        );
        Ok(LedgerOutcome::Applied(find_by_id(tx, subscription_id)?))
    })
}

/// 有効化料金の支払いを反映する
///
/// `activation_fee_paid=true`, `status=active` を設定する。開始日・終了日が既に設定されていれば保持し、
/// 未設定であれば現在と現在+`fallback_days` を設定する。
///
/// # 戻り値
/// 変更結果、行が存在しない場合は NotFound、条件付き更新が0行の場合は NoRowsAffected
pub fn apply_activation_fee_payment(
    conn: &Connection,
    subscription_id: &str,
    fallback_days: u32,
) -> AppResult<LedgerOutcome> {
    run_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let current = find_by_id(tx, subscription_id)?;

        if current.status == SubscriptionStatus::Active && current.activation_fee_paid {
            log::warn!("有効化料金は既に反映済みです: id={subscription_id}");
            return Ok(LedgerOutcome::AlreadyApplied(current));
        }

        current.status.validate_transition(&SubscriptionStatus::Active)?;

        let now = Utc::now();
        let start_date = current.start_date.unwrap_or(now);
        let expiry_date = current
            .expiry_date
            .unwrap_or_else(|| now + Duration::days(i64::from(fallback_days)));

        compare_and_swap(
            tx,
            &current,
            LedgerWrite {
                status: SubscriptionStatus::Active,
                subscription_fee_paid: current.subscription_fee_paid,
                activation_fee_paid: true,
                start_date,
                expiry_date,
                updated_at: now,
            },
        )?;

        log::info!(
            "有効化料金を反映しました: id={subscription_id}, expiry_date={expiry_date}, dates_preserved={}",
            current.expiry_date.is_some()
        );
        Ok(LedgerOutcome::Applied(find_by_id(tx, subscription_id)?))
    })
}

/// 台帳に書き込む値
struct LedgerWrite {
    status: SubscriptionStatus,
    subscription_fee_paid: bool,
    activation_fee_paid: bool,
    start_date: DateTime<Utc>,
    expiry_date: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 読み込んだ時点の状態と一致する場合のみ更新する
///
/// 読み込みから書き込みまでの間に行が変更されていれば0行更新となり、NoRowsAffected を返す。
fn compare_and_swap(conn: &Connection, expected: &Subscription, write: LedgerWrite) -> AppResult<()> {
    let rows_affected = conn.execute(
        "UPDATE subscriptions
         SET status = ?1, subscription_fee_paid = ?2, activation_fee_paid = ?3,
             start_date = ?4, expiry_date = ?5, updated_at = ?6
         WHERE id = ?7 AND status = ?8 AND subscription_fee_paid = ?9
           AND activation_fee_paid = ?10 AND updated_at = ?11",
        params![
            write.status,
            write.subscription_fee_paid,
            write.activation_fee_paid,
            write.start_date,
            write.expiry_date,
            write.updated_at,
            expected.id,
            expected.status,
            expected.subscription_fee_paid,
            expected.activation_fee_paid,
            expected.updated_at,
        ],
    )?;

    if rows_affected == 0 {
        log::error!(
            "サブスクリプションの条件付き更新が0行でした: id={}, expected_status={}",
            expected.id,
            expected.status
        );
        return Err(AppError::no_rows_affected(format!(
            "サブスクリプション {}",
            expected.id
        )));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// 作成日時と状態を指定してサブスクリプションを直接挿入する
    pub fn insert_subscription(
        conn: &Connection,
        user_id: &str,
        plan_id: &str,
        status: SubscriptionStatus,
        created_at: DateTime<Utc>,
    ) -> Subscription {
        let id = generate_id();
        let fee_paid = status == SubscriptionStatus::Active;
        conn.execute(
            "INSERT INTO subscriptions (id, user_id, plan_id, status, subscription_fee_paid, activation_fee_paid, start_date, expiry_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, NULL, ?6, ?7)",
            params![id, user_id, plan_id, status, fee_paid, created_at, created_at],
        )
        .expect("テスト用サブスクリプションの挿入に失敗");
        find_by_id(conn, &id).expect("挿入したサブスクリプションが見つかりません")
    }
}
