use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// Outbound mail queue. Enqueueing is this crate's job; transport is a
/// trait boundary (`gateway_background::Mailer`) a deployment binds.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mail_queue")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// De-duplication key, e.g. "alert:{alert_id}".
    #[sea_orm(unique_key = "mail_dedupe_key")]
    pub dedupe_key: String,
    pub recipients: Json,
    pub template_name: String,
    pub template_body: Json,
    pub send_at: OffsetDateTime,
    pub attempts: i32,
    pub retry_max: i32,
    pub retry_after_secs: i64,
    pub created_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
