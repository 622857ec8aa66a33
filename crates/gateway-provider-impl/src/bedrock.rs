use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{
    ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, Usage,
};
use gateway_provider_core::{Feature, FeatureSet, Provider, ProviderContext, ProviderError, ProviderKind};
use serde::{Deserialize, Serialize};

use crate::credentials::RestCredentials;
use crate::http::shared_client;
use crate::sigv4::SigV4Signer;

/// Bedrock's `InvokeModel` for Anthropic-family models on Bedrock, using
/// the `bedrock-2023-05-31` message schema.
pub struct BedrockProvider {
    creds: RestCredentials,
}

impl BedrockProvider {
    pub fn new(creds: RestCredentials) -> Self {
        Self { creds }
    }
}

#[derive(Serialize)]
struct BedrockMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct BedrockRequest<'a> {
    anthropic_version: &'a str,
    max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<BedrockMessage<'a>>,
}

#[derive(Deserialize)]
struct BedrockContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct BedrockUsage {
    #[serde(default)]
    input_tokens: i64,
    #[serde(default)]
    output_tokens: i64,
}

#[derive(Deserialize)]
struct BedrockResponse {
    content: Vec<BedrockContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: BedrockUsage,
}

#[async_trait]
impl Provider for BedrockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bedrock
    }

    fn features(&self) -> FeatureSet {
        FeatureSet::new([Feature::Chat])
    }

    async fn completion(
        &self,
        ctx: &ProviderContext,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let access_key_id = self.creds.access_key_id.as_deref().ok_or_else(|| {
            ProviderError::new("missing credential field: access_key_id", 500, "internal_error")
        })?;
        let secret_access_key = self.creds.secret_access_key.as_deref().ok_or_else(|| {
            ProviderError::new("missing credential field: secret_access_key", 500, "internal_error")
        })?;
        let region = self
            .creds
            .region
            .as_deref()
            .ok_or_else(|| ProviderError::new("missing credential field: region", 500, "internal_error"))?;

        let mut system = None;
        let mut messages = Vec::new();
        for message in &request.messages {
            let content = message.content.as_deref().unwrap_or_default();
            match message.role {
                ChatRole::System if system.is_none() => system = Some(content),
                ChatRole::System => {}
                ChatRole::User => messages.push(BedrockMessage { role: "user", content }),
                ChatRole::Assistant => messages.push(BedrockMessage { role: "assistant", content }),
                ChatRole::Tool => messages.push(BedrockMessage { role: "user", content }),
            }
        }
        let body = BedrockRequest {
            anthropic_version: "bedrock-2023-05-31",
            max_tokens: request.max_tokens.unwrap_or(4096),
            system,
            messages,
        };
        let payload = serde_json::to_vec(&body)
            .map_err(|e| ProviderError::new(format!("failed to encode request: {e}"), 500, "internal_error"))?;

        let host = format!("bedrock-runtime.{region}.amazonaws.com");
        let path = format!("/model/{}/invoke", ctx.model_name);
        let signer = SigV4Signer {
            access_key_id,
            secret_access_key,
            region,
            service: "bedrock",
        };
        let signed = signer.sign("POST", &host, &path, &payload, time::OffsetDateTime::now_utc());

        let client = shared_client(self.creds.proxy.as_deref())?;
        let response = client
            .post(format!("https://{host}{path}"))
            .header("Authorization", signed.authorization)
            .header("X-Amz-Date", signed.x_amz_date)
            .header("X-Amz-Content-Sha256", signed.x_amz_content_sha256)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string(), 502, "api_connection_error"))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(text, status, "invalid_request_error"));
        }

        let parsed: BedrockResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("malformed upstream response: {e}"), 502, "api_connection_error"))?;

        let text = parsed.content.into_iter().filter_map(|b| b.text).collect::<Vec<_>>().join("");
        Ok(ChatCompletionResponse {
            id: ctx.trace_id.clone(),
            object: "chat.completion".to_string(),
            created: 0,
            model: ctx.model_name.clone(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: Some(text),
                    name: None,
                    tool_calls: None,
                },
                finish_reason: parsed.stop_reason,
            }],
            usage: Some(Usage {
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
                total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
            }),
            trussed_controller_policy: None,
            remaining: None,
            spent: None,
        })
    }
}
