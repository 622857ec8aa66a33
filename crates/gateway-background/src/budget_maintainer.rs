use std::sync::Arc;

use gateway_core::budget::{BudgetCache, BudgetCacheEntry};
use gateway_storage::{Storage, WatchedKind};
use time::OffsetDateTime;

fn watched_kind(raw: &str) -> Option<WatchedKind> {
    match raw {
        "api_key" => Some(WatchedKind::ApiKey),
        "provider" => Some(WatchedKind::Provider),
        _ => None,
    }
}

/// Recomputes current spend for every `limited` budget and refreshes
/// its cache entry. The cache is single-writer; this loop is the writer.
pub async fn refresh_budgets<S: Storage>(
    storage: &Arc<S>,
    budget: &Arc<BudgetCache>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = OffsetDateTime::now_utc();
    for doc in storage.list_limited_budgets().await? {
        let Some(kind) = watched_kind(&doc.watched_kind) else {
            tracing::warn!(watched_kind = %doc.watched_kind, "unknown watched_kind on budget row, skipping");
            continue;
        };
        let since = doc.starts_at.unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let usage = storage.sum_usage_cost(kind, doc.watched_id, since).await?;
        let entry = BudgetCacheEntry::new(usage, doc.amount, now);
        budget.put(kind, doc.watched_id, &entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_storage::entities::budgets;
    use gateway_storage::SeaOrmStorage;
    use sea_orm::{ActiveValue, EntityTrait};

    fn tempdir() -> String {
        let nanos = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("gateway-budget-maintainer-test-{nanos}")).to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn limited_budget_gets_a_fresh_cache_entry() {
        let storage = Arc::new(SeaOrmStorage::connect("sqlite::memory:").await.unwrap());
        storage.sync().await.unwrap();
        let now = OffsetDateTime::now_utc();
        let active = budgets::ActiveModel {
            id: ActiveValue::NotSet,
            watched_kind: ActiveValue::Set("api_key".into()),
            watched_id: ActiveValue::Set(9),
            mode: ActiveValue::Set("expiring".into()),
            period: ActiveValue::Set("custom".into()),
            amount: ActiveValue::Set(50.0),
            starts_at: ActiveValue::Set(Some(now - time::Duration::hours(1))),
            ends_at: ActiveValue::Set(None),
            limited: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        budgets::Entity::insert(active).exec(storage.connection()).await.unwrap();

        let path = tempdir();
        let cache = Arc::new(BudgetCache::open(&path).unwrap());
        refresh_budgets(&storage, &cache).await.unwrap();

        let entry = cache.get(WatchedKind::ApiKey, 9, now).unwrap().unwrap();
        assert_eq!(entry.budget, 50.0);
        assert_eq!(entry.usage, 0.0);
        let _ = std::fs::remove_dir_all(&path);
    }
}
