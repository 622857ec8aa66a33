use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, Database, DatabaseBackend,
    DatabaseConnection, EntityTrait, QueryFilter, Schema,
};
use time::OffsetDateTime;

use crate::entities;
use crate::storage::{Storage, StorageError, StorageResult, WatchedKind};
use async_trait::async_trait;

/// `Storage` implementation backed by a single sea-orm connection, one
/// table per document collection.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
}

impl SeaOrmStorage {
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        let db = Database::connect(dsn).await?;
        if db.get_database_backend() == DatabaseBackend::Sqlite {
            db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
        }
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn create_table<E>(&self, entity: E) -> StorageResult<()>
    where
        E: sea_orm::EntityTrait,
    {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let stmt = schema.create_table_from_entity(entity).if_not_exists().to_owned();
        self.db.execute(backend.build(&stmt)).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for SeaOrmStorage {
    async fn sync(&self) -> StorageResult<()> {
        self.create_table(entities::ApiKeys).await?;
        self.create_table(entities::Providers).await?;
        self.create_table(entities::ModelPools).await?;
        self.create_table(entities::Policies).await?;
        self.create_table(entities::Budgets).await?;
        self.create_table(entities::Alerts).await?;
        self.create_table(entities::UsageRecords).await?;
        self.create_table(entities::MailQueue).await?;
        self.create_table(entities::LogQueue).await?;
        self.create_table(entities::GlobalConfig).await?;
        Ok(())
    }

    async fn find_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> StorageResult<Option<entities::api_keys::Model>> {
        use entities::api_keys::Column;
        Ok(entities::ApiKeys::find()
            .filter(Column::KeyHash.eq(key_hash))
            .one(&self.db)
            .await?)
    }

    async fn find_provider(&self, id: i64) -> StorageResult<Option<entities::providers::Model>> {
        Ok(entities::Providers::find_by_id(id).one(&self.db).await?)
    }

    async fn find_pool(&self, id: i64) -> StorageResult<Option<entities::model_pools::Model>> {
        Ok(entities::ModelPools::find_by_id(id).one(&self.db).await?)
    }

    async fn find_policy(&self, id: i64) -> StorageResult<Option<entities::policies::Model>> {
        Ok(entities::Policies::find_by_id(id).one(&self.db).await?)
    }

    async fn find_budget(
        &self,
        watched_kind: WatchedKind,
        watched_id: i64,
    ) -> StorageResult<Option<entities::budgets::Model>> {
        use entities::budgets::Column;
        Ok(entities::Budgets::find()
            .filter(Column::WatchedKind.eq(watched_kind.as_str()))
            .filter(Column::WatchedId.eq(watched_id))
            .one(&self.db)
            .await?)
    }

    async fn list_limited_budgets(&self) -> StorageResult<Vec<entities::budgets::Model>> {
        use entities::budgets::Column;
        Ok(entities::Budgets::find()
            .filter(Column::Limited.eq(true))
            .all(&self.db)
            .await?)
    }

    async fn sum_usage_cost(
        &self,
        watched_kind: WatchedKind,
        watched_id: i64,
        since: OffsetDateTime,
    ) -> StorageResult<f64> {
        use entities::usage_records::Column;
        let rows = match watched_kind {
            WatchedKind::ApiKey => {
                entities::UsageRecords::find()
                    .filter(Column::KeyId.eq(watched_id))
                    .filter(Column::At.gte(since))
                    .all(&self.db)
                    .await?
            }
            WatchedKind::Provider => {
                entities::UsageRecords::find()
                    .filter(Column::LlmId.eq(watched_id))
                    .filter(Column::At.gte(since))
                    .all(&self.db)
                    .await?
            }
        };
        Ok(rows.iter().map(|r| r.total_cost.unwrap_or(0.0)).sum())
    }

    async fn list_alerts(&self) -> StorageResult<Vec<entities::alerts::Model>> {
        Ok(entities::Alerts::find().all(&self.db).await?)
    }

    async fn list_due_alerts(
        &self,
        now: OffsetDateTime,
    ) -> StorageResult<Vec<entities::alerts::Model>> {
        use entities::alerts::Column;
        Ok(entities::Alerts::find()
            .filter(Column::EndsAt.lte(now))
            .all(&self.db)
            .await?)
    }

    async fn save_alert(&self, alert: entities::alerts::Model) -> StorageResult<()> {
        let active: entities::alerts::ActiveModel = alert.into();
        active.update(&self.db).await?;
        Ok(())
    }

    async fn insert_usage_record(
        &self,
        record: entities::usage_records::ActiveModel,
    ) -> StorageResult<i64> {
        let inserted = record.insert(&self.db).await?;
        Ok(inserted.id)
    }

    async fn enqueue_mail(&self, mail: entities::mail_queue::ActiveModel) -> StorageResult<()> {
        mail.insert(&self.db).await?;
        Ok(())
    }

    async fn pop_due_mail(
        &self,
        now: OffsetDateTime,
        limit: usize,
    ) -> StorageResult<Vec<entities::mail_queue::Model>> {
        use entities::mail_queue::Column;
        use sea_orm::QuerySelect;
        Ok(entities::MailQueue::find()
            .filter(Column::SendAt.lte(now))
            .limit(limit as u64)
            .all(&self.db)
            .await?)
    }

    async fn delete_mail(&self, id: i64) -> StorageResult<()> {
        entities::MailQueue::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn reschedule_mail(
        &self,
        id: i64,
        send_at: OffsetDateTime,
        attempts: i32,
    ) -> StorageResult<()> {
        let mut active = entities::mail_queue::ActiveModel {
            id: ActiveValue::Unchanged(id),
            ..Default::default()
        };
        active.send_at = ActiveValue::Set(send_at);
        active.attempts = ActiveValue::Set(attempts);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn enqueue_log(&self, payload: serde_json::Value) -> StorageResult<()> {
        let active = entities::log_queue::ActiveModel {
            id: ActiveValue::NotSet,
            payload: ActiveValue::Set(payload),
            created_at: ActiveValue::Set(OffsetDateTime::now_utc()),
        };
        active.insert(&self.db).await?;
        Ok(())
    }

    async fn pop_log_batch(&self, limit: usize) -> StorageResult<Vec<entities::log_queue::Model>> {
        use entities::log_queue::Column;
        use sea_orm::QueryOrder;
        use sea_orm::QuerySelect;
        Ok(entities::LogQueue::find()
            .order_by_asc(Column::Id)
            .limit(limit as u64)
            .all(&self.db)
            .await?)
    }

    async fn delete_logs(&self, ids: &[i64]) -> StorageResult<()> {
        use entities::log_queue::Column;
        entities::LogQueue::delete_many()
            .filter(Column::Id.is_in(ids.to_vec()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn upsert_api_key(&self, model: entities::api_keys::ActiveModel) -> StorageResult<i64> {
        let saved = model.save(&self.db).await?;
        Ok(saved.id.unwrap())
    }

    async fn upsert_provider(
        &self,
        model: entities::providers::ActiveModel,
    ) -> StorageResult<i64> {
        let saved = model.save(&self.db).await?;
        Ok(saved.id.unwrap())
    }

    async fn upsert_pool(&self, model: entities::model_pools::ActiveModel) -> StorageResult<i64> {
        let saved = model.save(&self.db).await?;
        Ok(saved.id.unwrap())
    }

    async fn upsert_policy(&self, model: entities::policies::ActiveModel) -> StorageResult<i64> {
        let saved = model.save(&self.db).await?;
        Ok(saved.id.unwrap())
    }

    async fn upsert_budget(&self, model: entities::budgets::ActiveModel) -> StorageResult<i64> {
        let saved = model.save(&self.db).await?;
        Ok(saved.id.unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sync_creates_all_tables() {
        let storage = SeaOrmStorage::connect("sqlite::memory:").await.unwrap();
        storage.sync().await.unwrap();
        assert!(storage.find_provider(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_key_roundtrips_by_hash() {
        let storage = SeaOrmStorage::connect("sqlite::memory:").await.unwrap();
        storage.sync().await.unwrap();
        let now = OffsetDateTime::now_utc();
        let active = entities::api_keys::ActiveModel {
            id: ActiveValue::NotSet,
            key_hash: ActiveValue::Set("hash123".into()),
            key_suffix: ActiveValue::Set("abcdef".into()),
            owner_id: ActiveValue::Set(1),
            provider_ids: ActiveValue::Set(serde_json::json!([])),
            pool_ids: ActiveValue::Set(serde_json::json!([])),
            policy_ids: ActiveValue::Set(serde_json::json!([])),
            expires_at: ActiveValue::Set(None),
            unbudgeted_until: ActiveValue::Set(None),
            rate_limit_count: ActiveValue::Set(None),
            rate_limit_period: ActiveValue::Set(None),
            max_prompt_tokens: ActiveValue::Set(None),
            scopes: ActiveValue::Set(serde_json::json!(["/ALL/"])),
            tags: ActiveValue::Set(serde_json::json!([])),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        storage.upsert_api_key(active).await.unwrap();

        let found = storage.find_api_key_by_hash("hash123").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().key_suffix, "abcdef");
    }
}
