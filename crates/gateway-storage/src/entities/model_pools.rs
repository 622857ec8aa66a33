use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A caller-visible virtual model name bound to an ordered list of
/// model references into providers.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "model_pools")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "pool_name")]
    pub name: String,
    /// `[{alias, provider_id, model_name}]`.
    pub models: Json,
    pub tags: Json,
    pub scopes: Json,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
