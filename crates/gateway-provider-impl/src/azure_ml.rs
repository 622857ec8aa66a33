use async_trait::async_trait;
use gateway_protocol::azureml::{
    ChatScoreInputData, ChatScoreMessage, ChatScoreRequest, EmbeddingScoreOutput, EmbeddingScoreRequest,
    PromptScoreRequest, ScoreTextOutput,
};
use gateway_protocol::openai::chat_completions::{
    ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole,
};
use gateway_protocol::openai::embeddings::{EmbeddingData, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
use gateway_provider_core::{Feature, FeatureSet, Provider, ProviderContext, ProviderError, ProviderKind};

use crate::credentials::RestCredentials;
use crate::http::shared_client;

/// A provider reached through Azure ML's generic scoring protocol: one
/// of three flavors distinguished by request shape (chat turns, a
/// single prompt, or a document batch for embedding), all POSTing to
/// `{base_url}/score`.
pub struct AzureMlProvider {
    kind: ProviderKind,
    creds: RestCredentials,
}

impl AzureMlProvider {
    pub fn new(kind: ProviderKind, creds: RestCredentials) -> Self {
        Self { kind, creds }
    }

    fn role_name(role: ChatRole) -> &'static str {
        match role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "user",
        }
    }
}

#[async_trait]
impl Provider for AzureMlProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn features(&self) -> FeatureSet {
        match self.kind {
            ProviderKind::AzureMlEmbeddingScore => FeatureSet::new([Feature::Embedding]),
            _ => FeatureSet::new([Feature::Chat]),
        }
    }

    async fn completion(
        &self,
        ctx: &ProviderContext,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        if self.kind == ProviderKind::AzureMlEmbeddingScore {
            return Err(ProviderError::unsupported("chat completion on an embedding-score endpoint"));
        }

        let base = self.creds.require_base_url()?.trim_end_matches('/');
        let key = self.creds.require_api_key()?;
        let client = shared_client(self.creds.proxy.as_deref())?;

        let body: Vec<u8> = match self.kind {
            ProviderKind::AzureMlPromptScore => {
                let prompt = request
                    .messages
                    .iter()
                    .filter_map(|m| m.content.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                serde_json::to_vec(&PromptScoreRequest { prompt })
            }
            _ => serde_json::to_vec(&ChatScoreRequest {
                input_data: ChatScoreInputData {
                    input_string: request
                        .messages
                        .iter()
                        .map(|m| ChatScoreMessage {
                            role: Self::role_name(m.role).to_string(),
                            content: m.content.clone().unwrap_or_default(),
                        })
                        .collect(),
                },
            }),
        }
        .map_err(|e| ProviderError::new(format!("failed to encode request: {e}"), 500, "internal_error"))?;

        let response = client
            .post(format!("{base}/score"))
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string(), 502, "api_connection_error"))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(text, status, "invalid_request_error"));
        }

        let parsed: ScoreTextOutput = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("malformed upstream response: {e}"), 502, "api_connection_error"))?;

        Ok(ChatCompletionResponse {
            id: ctx.trace_id.clone(),
            object: "chat.completion".to_string(),
            created: 0,
            model: ctx.model_name.clone(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: Some(parsed.output),
                    name: None,
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
            trussed_controller_policy: None,
            remaining: None,
            spent: None,
        })
    }

    async fn embedding(
        &self,
        ctx: &ProviderContext,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        if self.kind != ProviderKind::AzureMlEmbeddingScore {
            return Err(ProviderError::unsupported("embedding on a chat/prompt-score endpoint"));
        }
        let base = self.creds.require_base_url()?.trim_end_matches('/');
        let key = self.creds.require_api_key()?;
        let client = shared_client(self.creds.proxy.as_deref())?;

        let documents = request.input.as_strings().into_iter().map(str::to_string).collect();
        let response = client
            .post(format!("{base}/score"))
            .header("Authorization", format!("Bearer {key}"))
            .json(&EmbeddingScoreRequest { documents })
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string(), 502, "api_connection_error"))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(text, status, "invalid_request_error"));
        }

        let parsed: EmbeddingScoreOutput = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("malformed upstream response: {e}"), 502, "api_connection_error"))?;

        let data = parsed
            .into_iter()
            .enumerate()
            .map(|(index, embedding)| EmbeddingData {
                index: index as i64,
                embedding,
                object: "embedding".to_string(),
            })
            .collect();

        Ok(EmbeddingResponse {
            object: "list".to_string(),
            data,
            model: ctx.model_name.clone(),
            usage: EmbeddingUsage::default(),
            remaining: None,
            spent: None,
        })
    }
}
