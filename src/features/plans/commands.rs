use super::models::{CreatePlanDto, Plan, UpdatePlanDto};
use super::repository;
use crate::shared::errors::AppResult;
use crate::shared::principal::Principal;
use crate::AppState;

/// プランを作成する（管理者のみ）
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `principal` - 操作する管理者
/// * `dto` - プラン作成用DTO
///
/// # 戻り値
/// 作成されたプラン
pub fn create_plan(state: &AppState, principal: &Principal, dto: CreatePlanDto) -> AppResult<Plan> {
    principal.require_admin("create_plan")?;
    let db = state.connection()?;
    repository::create(&db, dto)
}

/// プランを更新する（管理者のみ）
pub fn update_plan(
    state: &AppState,
    principal: &Principal,
    id: &str,
    dto: UpdatePlanDto,
) -> AppResult<Plan> {
    principal.require_admin("update_plan")?;
    let db = state.connection()?;
    repository::update(&db, id, dto)
}

/// プラン一覧を取得する
pub fn get_plans(state: &AppState) -> AppResult<Vec<Plan>> {
    let db = state.connection()?;
    repository::find_all(&db)
}
