use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{
    ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, Usage,
};
use gateway_provider_core::{Feature, FeatureSet, Provider, ProviderContext, ProviderError, ProviderKind};
use serde::{Deserialize, Serialize};

use crate::credentials::RestCredentials;
use crate::http::shared_client;

pub struct GeminiProvider {
    creds: RestCredentials,
}

impl GeminiProvider {
    pub fn new(creds: RestCredentials) -> Self {
        Self { creds }
    }
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct GeminiUsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: i64,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: i64,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: GeminiUsageMetadata,
}

/// Gemini has no "assistant" role; the wire name is "model".
fn gemini_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::Assistant => "model",
        _ => "user",
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn features(&self) -> FeatureSet {
        FeatureSet::new([Feature::Chat, Feature::Vision])
    }

    async fn completion(
        &self,
        ctx: &ProviderContext,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let base = self
            .creds
            .base_url
            .as_deref()
            .unwrap_or("https://generativelanguage.googleapis.com/v1beta")
            .trim_end_matches('/');
        let key = self.creds.require_api_key()?;

        let mut system_instruction = None;
        let mut contents = Vec::new();
        for message in &request.messages {
            let text = message.content.as_deref().unwrap_or_default();
            if message.role == ChatRole::System && system_instruction.is_none() {
                system_instruction = Some(GeminiContent { role: "system", parts: vec![GeminiPart { text }] });
                continue;
            }
            contents.push(GeminiContent {
                role: gemini_role(message.role),
                parts: vec![GeminiPart { text }],
            });
        }

        let body = GeminiRequest { contents, system_instruction };
        let client = shared_client(self.creds.proxy.as_deref())?;
        let url = format!("{base}/models/{}:generateContent?key={key}", ctx.model_name);

        let response = client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string(), 502, "api_connection_error"))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(text, status, "invalid_request_error"));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("malformed upstream response: {e}"), 502, "api_connection_error"))?;

        let choices = parsed
            .candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let text = candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("");
                ChatCompletionChoice {
                    index: index as i64,
                    message: ChatMessage {
                        role: ChatRole::Assistant,
                        content: Some(text),
                        name: None,
                        tool_calls: None,
                    },
                    finish_reason: candidate.finish_reason,
                }
            })
            .collect();

        Ok(ChatCompletionResponse {
            id: ctx.trace_id.clone(),
            object: "chat.completion".to_string(),
            created: 0,
            model: ctx.model_name.clone(),
            choices,
            usage: Some(Usage {
                prompt_tokens: parsed.usage_metadata.prompt_token_count,
                completion_tokens: parsed.usage_metadata.candidates_token_count,
                total_tokens: parsed.usage_metadata.prompt_token_count + parsed.usage_metadata.candidates_token_count,
            }),
            trussed_controller_policy: None,
            remaining: None,
            spent: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_role_maps_to_model() {
        assert_eq!(gemini_role(ChatRole::Assistant), "model");
        assert_eq!(gemini_role(ChatRole::User), "user");
    }
}
