use std::collections::BTreeSet;
use std::sync::Arc;

use gateway_provider_core::{Feature, Provider, ProviderKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::PoolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub alias: String,
    pub model_name: String,
    pub provider_id: i64,
    pub price_input: f64,
    pub price_output: f64,
}

type Entry = (ModelInfo, Arc<dyn Provider>);

/// The merged view of every model a caller's API key can
/// reach, directly through permitted providers or indirectly through
/// permitted pools. Entries preserve insertion order so the first match
/// for an alias wins, matching the ordering promised for `select`.
#[derive(Default)]
pub struct ModelPool {
    entries: IndexMap<String, Vec<Entry>>,
    tags: BTreeSet<String>,
}

impl ModelPool {
    pub fn builder() -> ModelPoolBuilder {
        ModelPoolBuilder::default()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn aliases(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Resolves `name` to the first matching `(ModelInfo, Provider)` pair.
    pub fn select(&self, name: &str) -> Result<&Entry, PoolError> {
        self.entries
            .get(name)
            .and_then(|v| v.first())
            .ok_or_else(|| PoolError::UnlistedModel {
                requested: name.to_string(),
                known: self.aliases(),
            })
    }

    /// Every candidate bound to `name`, in the order they were merged,
    /// for the invoke pipeline's failover loop.
    pub fn candidates(&self, name: &str) -> Result<&[Entry], PoolError> {
        self.entries
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|v| v.as_slice())
            .ok_or_else(|| PoolError::UnlistedModel {
                requested: name.to_string(),
                known: self.aliases(),
            })
    }

    /// Narrows to entries whose provider's feature set is a superset of
    /// `required`. An empty result is an error, not an empty pool,
    /// because the caller always expected *some* usable model back.
    pub fn features_only(&self, required: &[Feature]) -> Result<ModelPool, PoolError> {
        let mut out = IndexMap::new();
        for (alias, candidates) in &self.entries {
            let filtered: Vec<Entry> = candidates
                .iter()
                .filter(|(_, provider)| provider.features().is_superset_of(required))
                .cloned()
                .collect();
            if !filtered.is_empty() {
                out.insert(alias.clone(), filtered);
            }
        }
        if out.is_empty() {
            return Err(PoolError::UnsupportedFeatures {
                features: required.to_vec(),
            });
        }
        Ok(ModelPool {
            entries: out,
            tags: self.tags.clone(),
        })
    }

    /// `provider_name/alias` lookup: narrows to entries
    /// whose provider kind's canonical tag matches `provider_name`,
    /// case-insensitively, then selects `alias` within that subset.
    pub fn select_with_provider(&self, provider_name: &str, alias: &str) -> Result<&Entry, PoolError> {
        let kind = ProviderKind::parse(provider_name).ok_or_else(|| PoolError::UnknownProvider {
            provider: provider_name.to_string(),
        })?;
        self.entries
            .get(alias)
            .and_then(|candidates| candidates.iter().find(|(_, provider)| provider.kind() == kind))
            .ok_or_else(|| PoolError::UnlistedModel {
                requested: format!("{provider_name}/{alias}"),
                known: self.aliases(),
            })
    }
}

#[derive(Default)]
pub struct ModelPoolBuilder {
    entries: IndexMap<String, Vec<Entry>>,
    tags: BTreeSet<String>,
}

impl ModelPoolBuilder {
    pub fn push(&mut self, alias: impl Into<String>, info: ModelInfo, provider: Arc<dyn Provider>) -> &mut Self {
        self.entries.entry(alias.into()).or_default().push((info, provider));
        self
    }

    pub fn extend_tags(&mut self, tags: impl IntoIterator<Item = String>) -> &mut Self {
        self.tags.extend(tags);
        self
    }

    pub fn build(self) -> ModelPool {
        ModelPool {
            entries: self.entries,
            tags: self.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse};
    use gateway_provider_core::{FeatureSet, ProviderContext, ProviderError};

    struct StubProvider {
        kind: ProviderKind,
        features: FeatureSet,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }
        fn features(&self) -> FeatureSet {
            self.features.clone()
        }
        async fn completion(
            &self,
            _ctx: &ProviderContext,
            _request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, ProviderError> {
            unreachable!()
        }
    }

    fn info(alias: &str) -> ModelInfo {
        ModelInfo {
            alias: alias.to_string(),
            model_name: alias.to_string(),
            provider_id: 1,
            price_input: 0.0,
            price_output: 0.0,
        }
    }

    #[test]
    fn select_returns_first_match() {
        let mut builder = ModelPool::builder();
        let provider: Arc<dyn Provider> = Arc::new(StubProvider {
            kind: ProviderKind::OpenAi,
            features: FeatureSet::new([Feature::Chat]),
        });
        builder.push("gpt", info("gpt"), provider);
        let pool = builder.build();
        assert!(pool.select("gpt").is_ok());
        assert!(pool.select("missing").is_err());
    }

    #[test]
    fn features_only_errors_when_nothing_matches() {
        let mut builder = ModelPool::builder();
        let provider: Arc<dyn Provider> = Arc::new(StubProvider {
            kind: ProviderKind::OpenAi,
            features: FeatureSet::new([Feature::Chat]),
        });
        builder.push("gpt", info("gpt"), provider);
        let pool = builder.build();
        let result = pool.features_only(&[Feature::Vision]);
        assert!(matches!(result, Err(PoolError::UnsupportedFeatures { .. })));
    }

    #[test]
    fn provider_prefixed_lookup_is_case_insensitive() {
        let mut builder = ModelPool::builder();
        let provider: Arc<dyn Provider> = Arc::new(StubProvider {
            kind: ProviderKind::OpenAi,
            features: FeatureSet::new([Feature::Chat]),
        });
        builder.push("gpt", info("gpt"), provider);
        let pool = builder.build();
        assert!(pool.select_with_provider("OPENAI", "gpt").is_ok());
        assert!(pool.select_with_provider("bedrock", "gpt").is_err());
    }
}
