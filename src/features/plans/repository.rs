use super::models::{CreatePlanDto, Plan, UpdatePlanDto};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{generate_id, validate_required_field, validate_text_length};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const PLAN_COLUMNS: &str =
    "id, slug, name, requires_activation, max_predictions_per_day, created_at, updated_at";

fn map_plan_row(row: &Row<'_>) -> rusqlite::Result<Plan> {
    Ok(Plan {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        requires_activation: row.get::<_, i64>(3)? != 0,
        max_predictions_per_day: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// スラッグを正規化する（小文字・前後の空白除去）
pub fn normalize_slug(slug: &str) -> String {
    slug.trim().to_lowercase()
}

/// プランを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - プラン作成用DTO
///
/// # 戻り値
/// 作成されたプラン、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreatePlanDto) -> AppResult<Plan> {
    validate_required_field(&dto.slug, "スラッグ")?;
    validate_required_field(&dto.name, "プラン名")?;
    validate_text_length(&dto.name, 100, "プラン名")?;

    let slug = normalize_slug(&dto.slug);
    if find_by_slug(conn, &slug)?.is_some() {
        return Err(AppError::validation(format!(
            "スラッグ {slug} のプランは既に存在します"
        )));
    }

    let id = generate_id();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO plans (id, slug, name, requires_activation, max_predictions_per_day, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            slug,
            dto.name.trim(),
            dto.requires_activation,
            dto.max_predictions_per_day,
            now,
            now
        ],
    )?;

    log::info!("プランを作成しました: id={id}, slug={slug}");
    find_by_id(conn, &id)
}

/// IDでプランを取得する
///
/// # 戻り値
/// プラン、または存在しない場合は NotFound
pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Plan> {
    conn.query_row(
        &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = ?1"),
        params![id],
        map_plan_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found(format!("プラン {id}")),
        _ => AppError::from(e),
    })
}

/// スラッグでプランを取得する
pub fn find_by_slug(conn: &Connection, slug: &str) -> AppResult<Option<Plan>> {
    let plan = conn
        .query_row(
            &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE slug = ?1"),
            params![normalize_slug(slug)],
            map_plan_row,
        )
        .optional()?;
    Ok(plan)
}

/// プラン一覧を取得する
pub fn find_all(conn: &Connection) -> AppResult<Vec<Plan>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans ORDER BY created_at, rowid"
    ))?;
    let plans = stmt.query_map([], map_plan_row)?;

    plans
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
}

/// プランを更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - プランID
/// * `dto` - プラン更新用DTO
///
/// # 戻り値
/// 更新されたプラン、または失敗時はエラー
pub fn update(conn: &Connection, id: &str, dto: UpdatePlanDto) -> AppResult<Plan> {
    let existing = find_by_id(conn, id)?;

    let name = match dto.name {
        Some(name) => {
            validate_required_field(&name, "プラン名")?;
            validate_text_length(&name, 100, "プラン名")?;
            name.trim().to_string()
        }
        None => existing.name,
    };
    let requires_activation = dto
        .requires_activation
        .unwrap_or(existing.requires_activation);
    let max_predictions_per_day = dto
        .max_predictions_per_day
        .unwrap_or(existing.max_predictions_per_day);

    let rows_affected = conn.execute(
        "UPDATE plans
         SET name = ?1, requires_activation = ?2, max_predictions_per_day = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            name,
            requires_activation,
            max_predictions_per_day,
            Utc::now(),
            id
        ],
    )?;

    if rows_affected == 0 {
        return Err(AppError::no_rows_affected(format!("プラン {id}")));
    }

    log::info!("プランを更新しました: id={id}");
    find_by_id(conn, id)
}
