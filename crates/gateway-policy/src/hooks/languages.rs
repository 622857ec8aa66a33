use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole};

use crate::error::HookError;
use crate::event::PolicyEvent;
use crate::hook::{CompletionTail, Hook, HookOutcome};
use crate::nlp::LanguageDetector;

use super::split_sentences;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageAction {
    Disabled,
    Sanitization,
    CustomResponse(String),
    Ban,
}

pub struct LanguagesHook {
    pub action: LanguageAction,
    /// Languages the caller has explicitly allowed, in addition to the
    /// suggested working set `{en, fr, de, es, pt}`.
    pub allow: HashSet<String>,
    pub detector: Arc<dyn LanguageDetector>,
}

impl LanguagesHook {
    fn effective_allow_set(&self) -> HashSet<String> {
        let mut set = self.allow.clone();
        for lang in ["en", "fr", "de", "es", "pt"] {
            set.insert(lang.to_string());
        }
        set
    }
}

#[async_trait]
impl Hook for LanguagesHook {
    fn identity(&self) -> &'static str {
        "languages"
    }

    async fn on_completion(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<(HookOutcome<ChatCompletionRequest>, CompletionTail), HookError> {
        if matches!(self.action, LanguageAction::Disabled) {
            return Ok((HookOutcome::unchanged(request), Box::new(|r| r)));
        }

        let allow = self.effective_allow_set();
        let mut events = Vec::new();

        for message in request.messages.iter_mut() {
            if message.role != ChatRole::User {
                continue;
            }
            let Some(content) = message.content.clone() else { continue };
            let sentences = split_sentences(&content);
            let mut offending = Vec::new();
            for sentence in &sentences {
                if sentence.chars().count() <= 6 {
                    continue;
                }
                if let Some(lang) = self.detector.detect(sentence)
                    && !allow.contains(&lang)
                {
                    offending.push(*sentence);
                }
            }
            if offending.is_empty() {
                continue;
            }

            let sample = offending.first().copied();
            events.push(PolicyEvent::new(2, "languages", sample));

            match &self.action {
                LanguageAction::Disabled => unreachable!(),
                LanguageAction::Ban => return Err(HookError::UnallowedLanguage),
                LanguageAction::CustomResponse(text) => {
                    return Err(HookError::InstantApiResponse(serde_json::json!({
                        "id": "policy-response",
                        "object": "chat.completion",
                        "choices": [{
                            "index": 0,
                            "message": { "role": "assistant", "content": text },
                            "finish_reason": "stop",
                        }],
                    })));
                }
                LanguageAction::Sanitization => {
                    let mut rebuilt = content.clone();
                    for bad in &offending {
                        rebuilt = rebuilt.replace(bad, "");
                    }
                    message.content = Some(rebuilt.trim().to_string());
                }
            }
        }

        Ok((HookOutcome { body: request, events, token_map: None }, Box::new(|r: ChatCompletionResponse| r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::HeuristicLanguageDetector;

    fn message(content: &str) -> ChatMessage {
        ChatMessage { role: ChatRole::User, content: Some(content.to_string()), name: None, tool_calls: None }
    }

    fn request(content: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "m".into(),
            messages: vec![message(content)],
            stream: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            n: None,
            tools: None,
            tool_choice: None,
            user: None,
            trussed_controller_policy: None,
        }
    }

    #[tokio::test]
    async fn allowed_language_is_untouched() {
        let hook = LanguagesHook {
            action: LanguageAction::Ban,
            allow: HashSet::new(),
            detector: Arc::new(HeuristicLanguageDetector),
        };
        let result = hook.on_completion(request("The cat and the dog are friends today")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn disabled_action_never_inspects() {
        let hook = LanguagesHook {
            action: LanguageAction::Disabled,
            allow: HashSet::new(),
            detector: Arc::new(HeuristicLanguageDetector),
        };
        let (outcome, _) = hook.on_completion(request("irrelevant content here")).await.unwrap();
        assert!(outcome.events.is_empty());
    }
}
