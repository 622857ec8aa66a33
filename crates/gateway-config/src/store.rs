use std::sync::Arc;
use std::time::Duration;

use gateway_common::{is_visible, ScopePath};
use gateway_storage::entities::{api_keys, model_pools, policies, providers};
use gateway_storage::{Storage, StorageError};

use crate::scope::ScopeContext;

/// Typed, scope-filtered, memoized access over the four hot-path
/// document collections. Wraps a `Storage` impl rather
/// than replacing it — background loops and admin operations still use
/// `Storage` directly. Cached by id, a TTL of 30s bounding how long a
/// mutation can be masked rather than an `updated_at` check, so a hit
/// never pays the storage round trip it's there to avoid.
pub struct ConfigStore<S: Storage> {
    storage: Arc<S>,
    keys: moka::sync::Cache<String, api_keys::Model>,
    providers: moka::sync::Cache<i64, providers::Model>,
    pools: moka::sync::Cache<i64, model_pools::Model>,
    policies: moka::sync::Cache<i64, policies::Model>,
}

impl<S: Storage> ConfigStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        let ttl = Duration::from_secs(30);
        Self {
            storage,
            keys: moka::sync::Cache::builder().time_to_live(ttl).build(),
            providers: moka::sync::Cache::builder().time_to_live(ttl).build(),
            pools: moka::sync::Cache::builder().time_to_live(ttl).build(),
            policies: moka::sync::Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub async fn find_key_by_hash(&self, hash: &str) -> Result<Option<api_keys::Model>, StorageError> {
        if let Some(cached) = self.keys.get(hash) {
            return Ok(Some(cached));
        }
        let Some(doc) = self.storage.find_api_key_by_hash(hash).await? else {
            return Ok(None);
        };
        self.keys.insert(hash.to_string(), doc.clone());
        Ok(Some(doc))
    }

    pub async fn find_provider(&self, id: i64) -> Result<Option<providers::Model>, StorageError> {
        if let Some(cached) = self.providers.get(&id) {
            return Ok(Some(cached));
        }
        let Some(doc) = self.storage.find_provider(id).await? else {
            return Ok(None);
        };
        self.providers.insert(id, doc.clone());
        Ok(Some(doc))
    }

    pub async fn find_pool(&self, id: i64) -> Result<Option<model_pools::Model>, StorageError> {
        if let Some(cached) = self.pools.get(&id) {
            return Ok(Some(cached));
        }
        let Some(doc) = self.storage.find_pool(id).await? else {
            return Ok(None);
        };
        self.pools.insert(id, doc.clone());
        Ok(Some(doc))
    }

    pub async fn find_policy(&self, id: i64) -> Result<Option<policies::Model>, StorageError> {
        if let Some(cached) = self.policies.get(&id) {
            return Ok(Some(cached));
        }
        let Some(doc) = self.storage.find_policy(id).await? else {
            return Ok(None);
        };
        self.policies.insert(id, doc.clone());
        Ok(Some(doc))
    }

    /// Filters `rows` for visibility under the current task's scope. In
    /// an unscoped block every row is visible.
    pub fn filter_visible<'a, T>(rows: &'a [T], scopes_of: impl Fn(&T) -> &'a [String]) -> Vec<&'a T> {
        if ScopeContext::is_unscoped() {
            return rows.iter().collect();
        }
        let allowed: Vec<ScopePath> = ScopeContext::current();
        rows.iter()
            .filter(|row| is_visible(scopes_of(row), &allowed))
            .collect()
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}
