/// プランカタログ
///
/// 管理者が作成・編集し、課金コアからは読み取り専用として扱う。
pub mod commands;
pub mod models;
pub mod repository;

pub use models::{CreatePlanDto, Plan, UpdatePlanDto};
