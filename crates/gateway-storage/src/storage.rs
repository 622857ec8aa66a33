use async_trait::async_trait;
use time::OffsetDateTime;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("serde json error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchedKind {
    ApiKey,
    Provider,
}

impl WatchedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchedKind::ApiKey => "api_key",
            WatchedKind::Provider => "provider",
        }
    }
}

/// Typed access over the document collections backing the gateway.
/// Callers use this for the hot-path lookups (key/provider/pool/policy)
/// plus the background-loop reads and writes; it is a contract, not a
/// schema.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn sync(&self) -> StorageResult<()>;

    async fn find_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> StorageResult<Option<crate::entities::api_keys::Model>>;
    async fn find_provider(&self, id: i64) -> StorageResult<Option<crate::entities::providers::Model>>;
    async fn find_pool(&self, id: i64) -> StorageResult<Option<crate::entities::model_pools::Model>>;
    async fn find_policy(&self, id: i64) -> StorageResult<Option<crate::entities::policies::Model>>;

    async fn find_budget(
        &self,
        watched_kind: WatchedKind,
        watched_id: i64,
    ) -> StorageResult<Option<crate::entities::budgets::Model>>;
    async fn list_limited_budgets(&self) -> StorageResult<Vec<crate::entities::budgets::Model>>;

    /// Sum of `total_cost` for every usage record attributed to
    /// `watched_kind`/`watched_id` with `at >= since`, used by the
    /// budget maintainer and the alert loops to recompute current
    /// spend over a window.
    async fn sum_usage_cost(
        &self,
        watched_kind: WatchedKind,
        watched_id: i64,
        since: OffsetDateTime,
    ) -> StorageResult<f64>;

    async fn list_alerts(&self) -> StorageResult<Vec<crate::entities::alerts::Model>>;
    async fn list_due_alerts(&self, now: OffsetDateTime) -> StorageResult<Vec<crate::entities::alerts::Model>>;
    async fn save_alert(&self, alert: crate::entities::alerts::Model) -> StorageResult<()>;

    async fn insert_usage_record(
        &self,
        record: crate::entities::usage_records::ActiveModel,
    ) -> StorageResult<i64>;

    async fn enqueue_mail(&self, mail: crate::entities::mail_queue::ActiveModel) -> StorageResult<()>;
    async fn pop_due_mail(&self, now: OffsetDateTime, limit: usize) -> StorageResult<Vec<crate::entities::mail_queue::Model>>;
    async fn delete_mail(&self, id: i64) -> StorageResult<()>;
    async fn reschedule_mail(&self, id: i64, send_at: OffsetDateTime, attempts: i32) -> StorageResult<()>;

    async fn enqueue_log(&self, payload: serde_json::Value) -> StorageResult<()>;
    async fn pop_log_batch(&self, limit: usize) -> StorageResult<Vec<crate::entities::log_queue::Model>>;
    async fn delete_logs(&self, ids: &[i64]) -> StorageResult<()>;

    // Upserts used by the control-panel CRUD (external collaborator);
    // exposed here only so bootstrap/test code can seed documents.
    async fn upsert_api_key(&self, model: crate::entities::api_keys::ActiveModel) -> StorageResult<i64>;
    async fn upsert_provider(&self, model: crate::entities::providers::ActiveModel) -> StorageResult<i64>;
    async fn upsert_pool(&self, model: crate::entities::model_pools::ActiveModel) -> StorageResult<i64>;
    async fn upsert_policy(&self, model: crate::entities::policies::ActiveModel) -> StorageResult<i64>;
    async fn upsert_budget(&self, model: crate::entities::budgets::ActiveModel) -> StorageResult<i64>;
}
