use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// Watches exactly one object (an API key or a provider).
/// `(watched_kind, watched_id)` is unique.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// "api_key" | "provider".
    #[sea_orm(unique_key = "budget_watched")]
    pub watched_kind: String,
    #[sea_orm(unique_key = "budget_watched")]
    pub watched_id: i64,
    /// "recurring" | "expiring".
    pub mode: String,
    /// "monthly" | "minutely" | "custom".
    pub period: String,
    pub amount: f64,
    pub starts_at: Option<OffsetDateTime>,
    pub ends_at: Option<OffsetDateTime>,
    pub limited: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
