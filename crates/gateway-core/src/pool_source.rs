use std::sync::Arc;

use async_trait::async_trait;

use gateway_config::ConfigStore;
use gateway_pool::PoolSource;
use gateway_provider_core::{Provider, ProviderRegistry};
use gateway_storage::entities::{model_pools, providers};
use gateway_storage::Storage;

/// Wires `ModelPool` construction to the config cache (for documents)
/// and the provider registry (for live `Provider` handles), so
/// `gateway-pool` never has to know how either is assembled.
pub struct StorageBackedPoolSource<S: Storage> {
    config: Arc<ConfigStore<S>>,
    registry: Arc<ProviderRegistry<S>>,
}

impl<S: Storage> StorageBackedPoolSource<S> {
    pub fn new(config: Arc<ConfigStore<S>>, registry: Arc<ProviderRegistry<S>>) -> Self {
        Self { config, registry }
    }
}

#[async_trait]
impl<S: Storage> PoolSource for StorageBackedPoolSource<S> {
    async fn find_provider(&self, id: i64) -> Option<providers::Model> {
        self.config.find_provider(id).await.ok().flatten()
    }

    async fn find_pool(&self, id: i64) -> Option<model_pools::Model> {
        self.config.find_pool(id).await.ok().flatten()
    }

    async fn resolve_provider(&self, doc: &providers::Model) -> Option<Arc<dyn Provider>> {
        self.registry.get(doc.id).await.ok().flatten()
    }
}
