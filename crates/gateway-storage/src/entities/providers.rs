use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A configured upstream LLM backend.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "provider_name")]
    pub name: String,
    /// One of the ten recognized provider kinds.
    pub kind: String,
    /// "connected" | "pending" | "error" | "disabled".
    pub status: String,
    pub credentials: Json,
    /// `[{name, alias, price_input, price_output, enabled}]`, prices per 1000 tokens.
    pub models: Json,
    pub tags: Json,
    pub unbudgeted_until: Option<OffsetDateTime>,
    pub scopes: Json,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
