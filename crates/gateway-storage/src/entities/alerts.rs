use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A spending watcher: emits e-mails when `used` crosses its threshold.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub watched_kind: String,
    pub watched_id: i64,
    /// "monthly" | "minutely" | "custom".
    pub period: String,
    /// "absolute" | "percentage".
    pub threshold_kind: String,
    pub threshold_value: f64,
    pub recipients: Json,
    pub used: f64,
    /// "ok" | "exceeded".
    pub threshold_state: String,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub timezone: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
