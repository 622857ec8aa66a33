use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// Local persistent queue of structured log records drained by the
/// log-queue consumer background loop.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "log_queue")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub payload: Json,
    pub created_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
