use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A per-request outcome, written once per invocation.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub trace_id: Option<String>,
    pub at: OffsetDateTime,
    pub response_time_ms: i64,
    pub is_error: bool,
    pub is_warning: bool,
    /// `{message, type, http_code, is_internal?}` when `is_error`.
    pub error: Option<Json>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub prompt_cost: Option<f64>,
    pub completion_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub owner_id: Option<i64>,
    pub key_id: Option<i64>,
    pub llm_id: Option<i64>,
    pub pool_id: Option<i64>,
    pub model: Option<String>,
    pub alias: Option<String>,
    pub provider: Option<String>,
    pub tags: Json,
    pub dev_id: Option<String>,
    pub scopes: Json,
    pub policy_events: Json,
    pub policy_digest: Option<String>,
    pub policy_event_count: i32,
    pub is_stream: bool,
    pub created_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
