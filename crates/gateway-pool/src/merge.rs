use std::sync::Arc;

use async_trait::async_trait;
use gateway_provider_core::Provider;
use gateway_storage::entities::{api_keys, model_pools, providers};

use crate::pool::{ModelInfo, ModelPool, ModelPoolBuilder};

#[derive(serde::Deserialize)]
struct ProviderModelDoc {
    name: String,
    alias: String,
    #[serde(default)]
    price_input: f64,
    #[serde(default)]
    price_output: f64,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(serde::Deserialize)]
struct PoolModelRef {
    alias: String,
    provider_id: i64,
    model_name: String,
}

/// Everything `build_from_apikey` needs to resolve documents into live
/// providers, supplied by `gateway-core` (backed by `ConfigStore` +
/// `ProviderRegistry`) so this crate stays independent of how either is
/// constructed.
#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn find_provider(&self, id: i64) -> Option<providers::Model>;
    async fn find_pool(&self, id: i64) -> Option<model_pools::Model>;
    async fn resolve_provider(&self, doc: &providers::Model) -> Option<Arc<dyn Provider>>;
}

/// Builds a `ModelPool` from one API key's directly permitted providers
/// plus its permitted pools.
pub async fn build_from_apikey(key: &api_keys::Model, source: &dyn PoolSource) -> ModelPool {
    let mut builder = ModelPool::builder();

    let provider_ids: Vec<i64> = serde_json::from_value(key.provider_ids.clone()).unwrap_or_default();
    for provider_id in provider_ids {
        if let Some(doc) = source.find_provider(provider_id).await {
            add_provider_models(&mut builder, &doc, source).await;
        }
    }

    let pool_ids: Vec<i64> = serde_json::from_value(key.pool_ids.clone()).unwrap_or_default();
    for pool_id in pool_ids {
        let Some(pool_doc) = source.find_pool(pool_id).await else { continue };
        let refs: Vec<PoolModelRef> = serde_json::from_value(pool_doc.models.clone()).unwrap_or_default();
        for model_ref in refs {
            let Some(provider_doc) = source.find_provider(model_ref.provider_id).await else { continue };
            let Some(provider) = source.resolve_provider(&provider_doc).await else { continue };
            builder.push(
                model_ref.alias.clone(),
                ModelInfo {
                    alias: model_ref.alias,
                    model_name: model_ref.model_name,
                    provider_id: provider_doc.id,
                    price_input: 0.0,
                    price_output: 0.0,
                },
                provider,
            );
        }
        let tags: Vec<String> = serde_json::from_value(pool_doc.tags.clone()).unwrap_or_default();
        builder.extend_tags(tags);
    }

    builder.build()
}

async fn add_provider_models(builder: &mut ModelPoolBuilder, doc: &providers::Model, source: &dyn PoolSource) {
    let Some(provider) = source.resolve_provider(doc).await else { return };
    let models: Vec<ProviderModelDoc> = serde_json::from_value(doc.models.clone()).unwrap_or_default();
    for model in models {
        if !model.enabled {
            continue;
        }
        builder.push(
            model.alias.clone(),
            ModelInfo {
                alias: model.alias,
                model_name: model.name,
                provider_id: doc.id,
                price_input: model.price_input,
                price_output: model.price_output,
            },
            provider.clone(),
        );
    }
    let tags: Vec<String> = serde_json::from_value(doc.tags.clone()).unwrap_or_default();
    builder.extend_tags(tags);
}
