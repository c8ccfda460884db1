/// 照合処理
///
/// 管理者の支払い確認を、どのサブスクリプションに反映するかを決める。
pub mod resolver;

pub use resolver::{resolve_subscription, Resolution, ResolutionStrategy, SubscriptionLookup};
