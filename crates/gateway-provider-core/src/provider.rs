use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};
use gateway_protocol::openai::embeddings::{EmbeddingRequest, EmbeddingResponse};

use crate::error::ProviderError;
use crate::feature::FeatureSet;

/// One in-flight provider call's ambient context: trace id for log
/// correlation and the provider document id it was resolved from.
#[derive(Clone, Debug, Default)]
pub struct ProviderContext {
    pub trace_id: String,
    pub provider_id: i64,
    pub model_name: String,
}

pub type ChatStream = std::pin::Pin<Box<dyn futures_util::Stream<Item = Result<ChatCompletionChunk, ProviderError>> + Send>>;

#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> crate::kind::ProviderKind;
    fn features(&self) -> FeatureSet;

    async fn completion(
        &self,
        ctx: &ProviderContext,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError>;

    async fn completion_stream(
        &self,
        ctx: &ProviderContext,
        request: &ChatCompletionRequest,
    ) -> Result<ChatStream, ProviderError> {
        let _ = (ctx, request);
        Err(ProviderError::unsupported("streaming"))
    }

    async fn embedding(
        &self,
        ctx: &ProviderContext,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        let _ = (ctx, request);
        Err(ProviderError::unsupported("embedding"))
    }
}
