use std::sync::Arc;

use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse, ChatRole};

use crate::error::HookError;
use crate::event::PolicyEvent;
use crate::hook::{CompletionTail, Hook, HookOutcome};
use crate::nlp::TextClassifier;

#[derive(Debug, Clone, PartialEq)]
pub enum TopicAction {
    Disabled,
    CustomResponse(String),
    Ban,
}

pub struct TopicDefinition {
    pub label: String,
    pub threshold: f32,
}

pub struct TopicsHook {
    pub action: TopicAction,
    pub topics: Vec<TopicDefinition>,
    pub classifier: Arc<dyn TextClassifier>,
}

#[async_trait]
impl Hook for TopicsHook {
    fn identity(&self) -> &'static str {
        "topics"
    }

    async fn on_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<(HookOutcome<ChatCompletionRequest>, CompletionTail), HookError> {
        if matches!(self.action, TopicAction::Disabled) || self.topics.is_empty() {
            return Ok((HookOutcome::unchanged(request), Box::new(|r| r)));
        }

        let labels: Vec<String> = self.topics.iter().map(|t| t.label.clone()).collect();
        let mut events = Vec::new();

        for message in &request.messages {
            if message.role != ChatRole::User {
                continue;
            }
            let Some(content) = message.content.as_deref() else { continue };
            let scores = self.classifier.classify(content, &labels);
            for topic in &self.topics {
                let Some((_, score)) = scores.iter().find(|(label, _)| label == &topic.label) else { continue };
                if *score < topic.threshold {
                    continue;
                }
                events.push(PolicyEvent::new(2, "topics", Some(&topic.label)));
                match &self.action {
                    TopicAction::Disabled => unreachable!(),
                    TopicAction::Ban => return Err(HookError::ForbiddenTopic(topic.label.clone())),
                    TopicAction::CustomResponse(text) => {
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
                }
            }
        }

        Ok((HookOutcome { body: request, events, token_map: None }, Box::new(|r: ChatCompletionResponse| r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::HeuristicTextClassifier;
    use gateway_protocol::openai::chat_completions::ChatMessage;

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

    #[tokio::test]
    async fn disabled_action_skips_classification() {
        let hook = TopicsHook {
            action: TopicAction::Disabled,
            topics: vec![TopicDefinition { label: "politics".into(), threshold: 0.1 }],
            classifier: Arc::new(HeuristicTextClassifier),
        };
        let (outcome, _) = hook.on_completion(request("politics")).await.unwrap();
        assert!(outcome.events.is_empty());
    }

    #[tokio::test]
    async fn matching_topic_over_threshold_bans() {
        let hook = TopicsHook {
            action: TopicAction::Ban,
            topics: vec![TopicDefinition { label: "politics".into(), threshold: 0.5 }],
            classifier: Arc::new(HeuristicTextClassifier),
        };
        let result = hook.on_completion(request("politics")).await;
        assert!(matches!(result, Err(HookError::ForbiddenTopic(ref t)) if t == "politics"));
    }
}
