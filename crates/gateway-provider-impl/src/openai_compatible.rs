use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse};
use gateway_protocol::openai::embeddings::{EmbeddingRequest, EmbeddingResponse};
use gateway_provider_core::{Feature, FeatureSet, Provider, ProviderContext, ProviderError, ProviderKind};

use crate::credentials::RestCredentials;
use crate::http::shared_client;

/// Shared client for OpenAI, Azure OpenAI, Mistral, and any
/// OpenAI-compatible endpoint: they all speak the same
/// `/chat/completions` and `/embeddings` wire shape, differing only in
/// base URL, auth header, and (for Azure) an `api-version` query param.
pub struct OpenAiCompatibleProvider {
    kind: ProviderKind,
    creds: RestCredentials,
}

impl OpenAiCompatibleProvider {
    pub fn new(kind: ProviderKind, creds: RestCredentials) -> Self {
        Self { kind, creds }
    }

    fn chat_url(&self) -> Result<String, ProviderError> {
        let base = self.creds.require_base_url()?.trim_end_matches('/');
        Ok(match self.kind {
            ProviderKind::AzureOpenAi => {
                let deployment = self
                    .creds
                    .deployment
                    .as_deref()
                    .ok_or_else(|| ProviderError::new("missing credential field: deployment", 500, "internal_error"))?;
                let version = self.creds.api_version.as_deref().unwrap_or("2024-06-01");
                format!("{base}/openai/deployments/{deployment}/chat/completions?api-version={version}")
            }
            _ => format!("{base}/chat/completions"),
        })
    }

    fn embeddings_url(&self) -> Result<String, ProviderError> {
        let base = self.creds.require_base_url()?.trim_end_matches('/');
        Ok(match self.kind {
            ProviderKind::AzureOpenAi => {
                let deployment = self
                    .creds
                    .deployment
                    .as_deref()
                    .ok_or_else(|| ProviderError::new("missing credential field: deployment", 500, "internal_error"))?;
                let version = self.creds.api_version.as_deref().unwrap_or("2024-06-01");
                format!("{base}/openai/deployments/{deployment}/embeddings?api-version={version}")
            }
            _ => format!("{base}/embeddings"),
        })
    }

    fn auth_header(&self) -> Result<(String, String), ProviderError> {
        let key = self.creds.require_api_key()?;
        Ok(match self.kind {
            ProviderKind::AzureOpenAi => ("api-key".to_string(), key.to_string()),
            _ => ("Authorization".to_string(), format!("Bearer {key}")),
        })
    }
}

async fn map_upstream_error(response: wreq::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let openai_type = if status == 429 {
        "rate_limit_error"
    } else if status >= 500 {
        "server_error"
    } else {
        "invalid_request_error"
    };
    ProviderError::new(body, status, openai_type)
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn features(&self) -> FeatureSet {
        FeatureSet::new([Feature::Chat, Feature::Streaming, Feature::Embedding, Feature::ToolCalling])
    }

    async fn completion(
        &self,
        ctx: &ProviderContext,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let client = shared_client(self.creds.proxy.as_deref())?;
        let url = self.chat_url()?;
        let (header_name, header_value) = self.auth_header()?;

        tracing::debug!(provider = %self.kind, model = %ctx.model_name, op = "completion", "calling upstream");

        let response = client
            .post(url)
            .header(header_name, header_value)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string(), 502, "api_connection_error"))?;

        if !response.status().is_success() {
            return Err(map_upstream_error(response).await);
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::new(format!("malformed upstream response: {e}"), 502, "api_connection_error"))
    }

    async fn embedding(
        &self,
        _ctx: &ProviderContext,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        let client = shared_client(self.creds.proxy.as_deref())?;
        let url = self.embeddings_url()?;
        let (header_name, header_value) = self.auth_header()?;

        let response = client
            .post(url)
            .header(header_name, header_value)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string(), 502, "api_connection_error"))?;

        if !response.status().is_success() {
            return Err(map_upstream_error(response).await);
        }

        response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| ProviderError::new(format!("malformed upstream response: {e}"), 502, "api_connection_error"))
    }
}
