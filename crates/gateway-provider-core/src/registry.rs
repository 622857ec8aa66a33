use std::sync::Arc;
use std::time::Duration;

use gateway_storage::entities::providers::Model as ProviderDoc;
use gateway_storage::{Storage, StorageError};

use crate::provider::Provider;

/// Builds `Arc<dyn Provider>` instances from `providers` documents and
/// caches them for 60s so a hot request path doesn't rebuild an HTTP
/// client (and its credential parsing) on every call.
pub struct ProviderRegistry<S: Storage> {
    storage: Arc<S>,
    cache: moka::sync::Cache<i64, Arc<dyn Provider>>,
    builder: Box<dyn Fn(&ProviderDoc) -> Result<Arc<dyn Provider>, crate::error::ProviderError> + Send + Sync>,
}

impl<S: Storage> ProviderRegistry<S> {
    pub fn new(
        storage: Arc<S>,
        builder: impl Fn(&ProviderDoc) -> Result<Arc<dyn Provider>, crate::error::ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            storage,
            cache: moka::sync::Cache::builder()
                .time_to_live(Duration::from_secs(60))
                .build(),
            builder: Box::new(builder),
        }
    }

    /// Returns `None` for missing, disabled, or deleted providers.
    pub async fn get(&self, provider_id: i64) -> Result<Option<Arc<dyn Provider>>, StorageError> {
        if let Some(cached) = self.cache.get(&provider_id) {
            return Ok(Some(cached));
        }
        let Some(doc) = self.storage.find_provider(provider_id).await? else {
            return Ok(None);
        };
        if doc.status == "disabled" {
            return Ok(None);
        }
        let built = match (self.builder)(&doc) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        self.cache.insert(provider_id, built.clone());
        Ok(Some(built))
    }

    pub fn invalidate(&self, provider_id: i64) {
        self.cache.invalidate(&provider_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSet;
    use crate::kind::ProviderKind;
    use async_trait::async_trait;
    use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse};
    use gateway_storage::SeaOrmStorage;

    struct StubProvider;

    #[async_trait]
    impl Provider for StubProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }
        fn features(&self) -> FeatureSet {
            FeatureSet::default()
        }
        async fn completion(
            &self,
            _ctx: &crate::provider::ProviderContext,
            _request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, crate::error::ProviderError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn missing_provider_returns_none() {
        let storage = Arc::new(SeaOrmStorage::connect("sqlite::memory:").await.unwrap());
        storage.sync().await.unwrap();
        let registry = ProviderRegistry::new(storage, |_doc| Ok(Arc::new(StubProvider) as Arc<dyn Provider>));
        assert!(registry.get(42).await.unwrap().is_none());
    }
}
