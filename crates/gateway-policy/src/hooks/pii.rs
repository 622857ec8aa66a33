use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse, ChatRole};

use crate::error::HookError;
use crate::event::PolicyEvent;
use crate::hook::{CompletionTail, Hook, HookOutcome};
use crate::nlp::{AnonymizeMode, Anonymizer, NerEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiAction {
    Disabled,
    Redaction,
    Anonymization,
    Tokenization,
}

impl PiiAction {
    fn mode(self) -> Option<AnonymizeMode> {
        match self {
            PiiAction::Disabled => None,
            PiiAction::Redaction => Some(AnonymizeMode::Redaction),
            PiiAction::Anonymization => Some(AnonymizeMode::Anonymization),
            PiiAction::Tokenization => Some(AnonymizeMode::Tokenization),
        }
    }
}

pub struct PiiHook {
    pub action: PiiAction,
    pub ner: Arc<dyn NerEngine>,
    pub anonymizer: Arc<dyn Anonymizer>,
}

#[async_trait]
impl Hook for PiiHook {
    fn identity(&self) -> &'static str {
        "pii"
    }

    async fn on_completion(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<(HookOutcome<ChatCompletionRequest>, CompletionTail), HookError> {
        let Some(mode) = self.action.mode() else {
            return Ok((HookOutcome::unchanged(request), Box::new(|r| r)));
        };

        let mut events = Vec::new();
        let tokens: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));

        for message in request.messages.iter_mut() {
            let previously_detokenized = message.content.as_deref().is_some_and(|c| c.ends_with('\u{200E}'));
            if message.role != ChatRole::User && !previously_detokenized {
                continue;
            }
            let Some(content) = message.content.clone() else { continue };
            let entities = self.ner.recognize(&content);
            if entities.is_empty() {
                continue;
            }

            let sample = entities.first().map(|e| e.kind.as_str());
            events.push(PolicyEvent::new(1, "pii", sample));

            let mut emitted = tokens.lock().unwrap();
            let rewritten = self.anonymizer.anonymize(&content, &entities, mode, &mut |token, original| {
                emitted.insert(token.to_string(), original.to_string());
            });
            drop(emitted);
            message.content = Some(rewritten);
        }

        let token_map = if matches!(self.action, PiiAction::Tokenization) && !tokens.lock().unwrap().is_empty() {
            Some(tokens.clone())
        } else {
            None
        };

        let tail: CompletionTail = if matches!(self.action, PiiAction::Tokenization) {
            Box::new(move |mut response: ChatCompletionResponse| {
                let map = tokens.lock().unwrap();
                if map.is_empty() {
                    return response;
                }
                for choice in response.choices.iter_mut() {
                    let Some(content) = choice.message.content.as_ref() else { continue };
                    let mut rewritten = content.clone();
                    let mut detokenized = false;
                    for (token, original) in map.iter() {
                        if rewritten.contains(token.as_str()) {
                            rewritten = rewritten.replace(token.as_str(), original);
                            detokenized = true;
                        }
                    }
                    if detokenized {
                        rewritten.push('\u{200E}');
                        choice.message.content = Some(rewritten);
                    }
                }
                response
            })
        } else {
            Box::new(|r| r)
        };

        Ok((HookOutcome { body: request, events, token_map }, tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::{DefaultAnonymizer, HeuristicNerEngine};
    use gateway_protocol::openai::chat_completions::{ChatMessage, ChatCompletionChoice};

    fn request(content: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "m".into(),
            messages: vec![ChatMessage { role: ChatRole::User, content: Some(content.to_string()), name: None, tool_calls: None }],
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

    fn hook(action: PiiAction) -> PiiHook {
        PiiHook { action, ner: Arc::new(HeuristicNerEngine::default()), anonymizer: Arc::new(DefaultAnonymizer) }
    }

    #[tokio::test]
    async fn disabled_action_leaves_content_untouched() {
        let (outcome, _) = hook(PiiAction::Disabled).on_completion(request("a@b.com")).await.unwrap();
        assert_eq!(outcome.body.messages[0].content.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn redaction_masks_the_entity() {
        let (outcome, _) = hook(PiiAction::Redaction).on_completion(request("contact a@b.com")).await.unwrap();
        assert!(!outcome.body.messages[0].content.as_ref().unwrap().contains("a@b.com"));
        assert_eq!(outcome.events.len(), 1);
    }

    #[tokio::test]
    async fn assistant_message_marked_previously_detokenized_is_rescanned() {
        let mut turn = request("hello");
        turn.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: Some("sure, email me at a@b.com\u{200E}".to_string()),
            name: None,
            tool_calls: None,
        });
        let (outcome, _) = hook(PiiAction::Redaction).on_completion(turn).await.unwrap();
        let rescanned = outcome.body.messages[1].content.as_ref().unwrap();
        assert!(!rescanned.contains("a@b.com"));
        assert_eq!(outcome.events.len(), 2);
    }

    #[tokio::test]
    async fn tokenization_detokenizes_in_the_tail() {
        let (outcome, tail) = hook(PiiAction::Tokenization).on_completion(request("contact a@b.com")).await.unwrap();
        let token = {
            let content = outcome.body.messages[0].content.clone().unwrap();
            content.split_whitespace().find(|w| w.starts_with('\u{394}')).unwrap().to_string()
        };

        let response = ChatCompletionResponse {
            id: "r".into(),
            object: "chat.completion".into(),
            created: 0,
            model: "m".into(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: Some(format!("sure, I'll email {token}")),
                    name: None,
                    tool_calls: None,
                },
                finish_reason: Some("stop".into()),
            }],
            usage: None,
            trussed_controller_policy: None,
            remaining: None,
            spent: None,
        };
        let result = tail(response);
        let content = result.choices[0].message.content.as_ref().unwrap();
        assert!(content.contains("a@b.com"));
        assert!(content.ends_with('\u{200E}'));
    }
}
