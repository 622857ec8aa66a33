use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{
    ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, Usage,
};
use gateway_provider_core::{Feature, FeatureSet, Provider, ProviderContext, ProviderError, ProviderKind};
use serde::{Deserialize, Serialize};

use crate::credentials::RestCredentials;
use crate::http::shared_client;

pub struct AnthropicProvider {
    creds: RestCredentials,
}

impl AnthropicProvider {
    pub fn new(creds: RestCredentials) -> Self {
        Self { creds }
    }
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: i64,
    #[serde(default)]
    output_tokens: i64,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

/// Anthropic's Messages API has no `system`-role message inline in
/// `messages`; the first system message (if any) becomes the request's
/// top-level `system` field.
fn to_anthropic_request<'a>(model: &'a str, request: &'a ChatCompletionRequest) -> AnthropicRequest<'a> {
    let mut system = None;
    let mut messages = Vec::new();
    for message in &request.messages {
        let content = message.content.as_deref().unwrap_or_default();
        match message.role {
            ChatRole::System if system.is_none() => system = Some(content),
            ChatRole::System => {}
            ChatRole::User => messages.push(AnthropicMessage { role: "user", content }),
            ChatRole::Assistant => messages.push(AnthropicMessage { role: "assistant", content }),
            ChatRole::Tool => messages.push(AnthropicMessage { role: "user", content }),
        }
    }
    AnthropicRequest {
        model,
        max_tokens: request.max_tokens.unwrap_or(4096),
        system,
        messages,
        temperature: request.temperature,
    }
}

fn from_anthropic_response(resp: AnthropicResponse) -> ChatCompletionResponse {
    let text = resp.content.into_iter().filter_map(|b| b.text).collect::<Vec<_>>().join("");
    ChatCompletionResponse {
        id: resp.id,
        object: "chat.completion".to_string(),
        created: 0,
        model: resp.model,
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ChatMessage {
                role: ChatRole::Assistant,
                content: Some(text),
                name: None,
                tool_calls: None,
            },
            finish_reason: resp.stop_reason,
        }],
        usage: Some(Usage {
            prompt_tokens: resp.usage.input_tokens,
            completion_tokens: resp.usage.output_tokens,
            total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
        }),
        trussed_controller_policy: None,
        remaining: None,
        spent: None,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn features(&self) -> FeatureSet {
        FeatureSet::new([Feature::Chat, Feature::Streaming, Feature::Vision])
    }

    async fn completion(
        &self,
        ctx: &ProviderContext,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let client = shared_client(self.creds.proxy.as_deref())?;
        let base = self
            .creds
            .base_url
            .as_deref()
            .unwrap_or("https://api.anthropic.com")
            .trim_end_matches('/');
        let key = self.creds.require_api_key()?;
        let body = to_anthropic_request(&ctx.model_name, request);

        let response = client
            .post(format!("{base}/v1/messages"))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string(), 502, "api_connection_error"))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(text, status, "invalid_request_error"));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("malformed upstream response: {e}"), 502, "api_connection_error"))?;
        Ok(from_anthropic_response(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_system_message_becomes_top_level_system() {
        let request = ChatCompletionRequest {
            model: "claude".into(),
            messages: vec![
                ChatMessage { role: ChatRole::System, content: Some("be terse".into()), name: None, tool_calls: None },
                ChatMessage { role: ChatRole::System, content: Some("ignored".into()), name: None, tool_calls: None },
                ChatMessage { role: ChatRole::User, content: Some("hi".into()), name: None, tool_calls: None },
            ],
            stream: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            n: None,
            tools: None,
            tool_choice: None,
            user: None,
            trussed_controller_policy: None,
        };
        let converted = to_anthropic_request("claude-3", &request);
        assert_eq!(converted.system, Some("be terse"));
        assert_eq!(converted.messages.len(), 1);
    }
}
