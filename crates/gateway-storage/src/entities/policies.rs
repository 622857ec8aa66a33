use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A named, ordered list of content-policy controls.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "policies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "policy_name")]
    pub name: String,
    /// Ordered `[{control: "invisible_text"|"languages"|"prompt_injection"|
    /// "topics"|"pii"|"code_provenance", options: {...}}]`.
    pub controls: Json,
    pub scopes: Json,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
