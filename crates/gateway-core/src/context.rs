use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use gateway_config::ConfigStore;
use gateway_policy::{HookSet, PolicyEvent, PolicyOutcome};
use gateway_pool::{build_from_apikey, ModelInfo, ModelPool};
use gateway_provider_core::{Provider, ProviderRegistry};
use gateway_storage::entities::api_keys;
use gateway_storage::{Storage, WatchedKind};

use crate::budget::BudgetCache;
use crate::error::GatewayError;
use crate::policy_build::build_hooks;
use crate::pool_source::StorageBackedPoolSource;
use crate::usage::UsageDraft;

/// Everything a request context needs to resolve models, run hooks,
/// and record usage, shared across every request a process handles.
pub struct GatewayDeps<S: Storage> {
    pub storage: Arc<S>,
    pub config: Arc<ConfigStore<S>>,
    pub registry: Arc<ProviderRegistry<S>>,
    pub budget: Arc<BudgetCache>,
}

/// A per-request object: the resolved key, its merged model pool, the
/// active hook set, and the bookkeeping the invoke pipeline needs to
/// produce a usage record when it is done.
pub struct RequestContext<S: Storage> {
    pub key: api_keys::Model,
    pub pool: ModelPool,
    pub hooks: Arc<HookSet>,
    pub current: Option<(ModelInfo, Arc<dyn Provider>)>,
    pub misc: HashMap<String, JsonValue>,
    pub policy_responses: Vec<JsonValue>,
    pub(crate) policy_events: Mutex<Vec<PolicyEvent>>,
    pub(crate) policy_digest: Mutex<Option<String>>,
    pub usage_kwargs: HashMap<String, JsonValue>,
    pub request_id: Option<String>,
    started_at: Instant,
    pub(crate) deps: Arc<GatewayDeps<S>>,
}

impl<S: Storage> RequestContext<S> {
    /// Builds the pool snapshot from the key's directly permitted
    /// providers and pools, and the active hook set from the policies
    /// it references, in the order `policy_ids` lists them.
    pub async fn from_apikey(key: api_keys::Model, deps: Arc<GatewayDeps<S>>) -> Result<Self, GatewayError> {
        let source = StorageBackedPoolSource::new(deps.config.clone(), deps.registry.clone());
        let pool = build_from_apikey(&key, &source).await;

        let policy_ids: Vec<i64> = serde_json::from_value(key.policy_ids.clone()).unwrap_or_default();
        let mut hooks = Vec::new();
        for policy_id in policy_ids {
            if let Some(doc) = deps.config.find_policy(policy_id).await? {
                hooks.extend(build_hooks(&doc));
            }
        }

        Ok(Self {
            key,
            pool,
            hooks: Arc::new(HookSet::new(hooks)),
            current: None,
            misc: HashMap::new(),
            policy_responses: Vec::new(),
            policy_events: Mutex::new(Vec::new()),
            policy_digest: Mutex::new(None),
            usage_kwargs: HashMap::new(),
            request_id: None,
            started_at: Instant::now(),
            deps,
        })
    }

    /// Provider-prefixed (`provider/alias`) or bare-alias lookup,
    /// returning the resolved alias and its ordered candidate list.
    pub fn select(&self, model: &str) -> Result<(String, Vec<(ModelInfo, Arc<dyn Provider>)>), GatewayError> {
        if let Some((provider_name, alias)) = model.split_once('/') {
            if let Ok(entry) = self.pool.select_with_provider(provider_name, alias) {
                return Ok((alias.to_string(), vec![entry.clone()]));
            }
        }
        let candidates = self.pool.candidates(model)?;
        Ok((model.to_string(), candidates.to_vec()))
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.started_at.elapsed().as_millis() as i64
    }

    /// A draft usage record seeded from context metadata; callers
    /// finish it with `set_model_usage`/`set_error` and insert it.
    pub fn create_usage(&self) -> UsageDraft {
        let tags: Vec<String> = serde_json::from_value(self.key.tags.clone()).unwrap_or_default();
        let scopes: Vec<String> = serde_json::from_value(self.key.scopes.clone()).unwrap_or_default();
        let mut draft = UsageDraft::new(self.key.owner_id, self.key.id, scopes, tags);
        draft.trace_id = self.request_id.clone();
        if let Some((info, provider)) = &self.current {
            draft.llm_id = Some(info.provider_id);
            draft.model = Some(info.model_name.clone());
            draft.alias = Some(info.alias.clone());
            draft.provider = Some(provider.kind().tag().to_string());
        }
        draft
    }

    /// Current policy fingerprint accumulated this request, used by
    /// `create_usage` callers that want it before the pipeline finishes.
    pub fn policy_events_snapshot(&self) -> Vec<PolicyEvent> {
        self.policy_events.lock().unwrap().clone()
    }

    pub fn policy_digest_snapshot(&self) -> Option<String> {
        self.policy_digest.lock().unwrap().clone()
    }

    /// `(remaining, spent)` for whichever of the caller key or
    /// `provider_id` has the tighter cached budget entry, read once per
    /// successful completion; `None` if neither is tracked.
    pub fn budget_summary(&self, provider_id: i64) -> Option<(f64, f64)> {
        let now = OffsetDateTime::now_utc();
        let key_entry = self.deps.budget.get(WatchedKind::ApiKey, self.key.id, now).ok().flatten();
        let provider_entry = self.deps.budget.get(WatchedKind::Provider, provider_id, now).ok().flatten();
        crate::budget::pick_spend_summary(key_entry.as_ref(), provider_entry.as_ref())
    }

    /// Folds a hook-application outcome into the context's running
    /// policy fingerprint, called once per `apply_completion`/
    /// `apply_embedding` in the invoke pipeline.
    pub(crate) fn record_policy_outcome(&self, outcome: &PolicyOutcome) {
        self.policy_events.lock().unwrap().extend(outcome.events.iter().cloned());
        if let Some(digest) = &outcome.digest {
            *self.policy_digest.lock().unwrap() = Some(digest.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_storage::SeaOrmStorage;
    use time::OffsetDateTime;

    fn tempdir() -> String {
        let nanos = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("gateway-context-test-{nanos}")).to_string_lossy().to_string()
    }

    async fn empty_key() -> api_keys::Model {
        let now = OffsetDateTime::now_utc();
        api_keys::Model {
            id: 1,
            key_hash: "h".into(),
            key_suffix: "abcdef".into(),
            owner_id: 1,
            provider_ids: serde_json::json!([]),
            pool_ids: serde_json::json!([]),
            policy_ids: serde_json::json!([]),
            expires_at: None,
            unbudgeted_until: None,
            rate_limit_count: None,
            rate_limit_period: None,
            max_prompt_tokens: None,
            scopes: serde_json::json!(["/ALL/"]),
            tags: serde_json::json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    async fn deps() -> Arc<GatewayDeps<SeaOrmStorage>> {
        let storage = Arc::new(SeaOrmStorage::connect("sqlite::memory:").await.unwrap());
        storage.sync().await.unwrap();
        let config = Arc::new(ConfigStore::new(storage.clone()));
        let registry = Arc::new(ProviderRegistry::new(storage.clone(), |_doc| {
            Err(gateway_provider_core::ProviderError::internal("unused in this test"))
        }));
        let budget = Arc::new(BudgetCache::open(&tempdir()).unwrap());
        Arc::new(GatewayDeps { storage, config, registry, budget })
    }

    #[tokio::test]
    async fn empty_key_builds_an_empty_pool_and_hookset() {
        let ctx = RequestContext::from_apikey(empty_key().await, deps().await).await.unwrap();
        assert!(ctx.pool.aliases().is_empty());
        assert!(ctx.select("gpt-4").is_err());
    }
}
