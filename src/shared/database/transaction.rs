use crate::shared::errors::AppResult;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// 処理をひとつのデータベーストランザクション内で実行する
///
/// 処理がエラーを返した場合はロールバックされ、部分的な書き込みは残らない。
/// 呼び出し時点で既にトランザクション中であれば、外側のトランザクションに参加する
/// （コミット・ロールバックは外側に委ねる）。
///
/// # 引数
/// * `conn` - データベース接続
/// * `behavior` - 開始時のロック取得方法
/// * `operation` - 実行する処理
pub fn run_in_transaction<T, F>(
    conn: &Connection,
    behavior: TransactionBehavior,
    operation: F,
) -> AppResult<T>
where
    F: FnOnce(&Connection) -> AppResult<T>,
{
    if !conn.is_autocommit() {
        return operation(conn);
    }

    let tx = Transaction::new_unchecked(conn, behavior)?;
    let result = operation(&*tx)?;
    tx.commit()?;
    Ok(result)
}
