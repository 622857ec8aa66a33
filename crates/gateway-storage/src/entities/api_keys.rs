use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// The bearer credential a caller presents. The key itself is never
/// stored, only its hash and a six-character suffix for display.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "api_key_hash")]
    pub key_hash: String,
    pub key_suffix: String,
    pub owner_id: i64,
    /// Provider ids the key may call directly.
    pub provider_ids: Json,
    /// Model pool ids the key may call.
    pub pool_ids: Json,
    pub policy_ids: Json,
    pub expires_at: Option<OffsetDateTime>,
    pub unbudgeted_until: Option<OffsetDateTime>,
    pub rate_limit_count: Option<i32>,
    /// One of "second" | "minute" | "hour".
    pub rate_limit_period: Option<String>,
    pub max_prompt_tokens: Option<i64>,
    pub scopes: Json,
    pub tags: Json,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
