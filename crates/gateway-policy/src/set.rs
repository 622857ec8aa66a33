use std::sync::Arc;

use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse};
use gateway_protocol::openai::embeddings::{EmbeddingRequest, EmbeddingResponse};

use crate::error::HookError;
use crate::event::{PolicyDigest, PolicyEvent};
use crate::hook::{Hook, TokenMap};

/// Every policy event collected across a request, plus the combined
/// fingerprint over the (text, hook identity) pairs that produced them.
pub struct PolicyOutcome {
    pub events: Vec<PolicyEvent>,
    pub digest: Option<String>,
    /// Set when a hook tokenized PII, so a streaming response can be
    /// detokenized chunk-by-chunk as it is forwarded to the client.
    pub token_map: Option<TokenMap>,
}

/// An ordered list of hooks applied to one request. Each hook runs in
/// turn against the previous hook's (possibly rewritten) body; a hook
/// returning an error stops the pipeline there.
pub struct HookSet {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookSet {
    pub fn new(hooks: Vec<Arc<dyn Hook>>) -> Self {
        Self { hooks }
    }

    pub async fn apply_completion(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<(ChatCompletionRequest, PolicyOutcome, impl FnOnce(ChatCompletionResponse) -> ChatCompletionResponse), HookError> {
        let mut events = Vec::new();
        let mut digest = PolicyDigest::new();
        let mut tails = Vec::new();
        let mut token_map = None;

        for hook in &self.hooks {
            let (outcome, tail) = hook.on_completion(request).await?;
            for event in &outcome.events {
                if let Some(sample) = &event.sample {
                    digest.feed(sample, hook.identity());
                }
            }
            events.extend(outcome.events);
            if outcome.token_map.is_some() {
                token_map = outcome.token_map;
            }
            request = outcome.body;
            tails.push(tail);
        }

        let combined = move |mut response: ChatCompletionResponse| {
            for tail in tails {
                response = tail(response);
            }
            response
        };

        Ok((request, PolicyOutcome { events, digest: digest.finish(), token_map }, combined))
    }

    pub async fn apply_embedding(
        &self,
        mut request: EmbeddingRequest,
    ) -> Result<(EmbeddingRequest, PolicyOutcome, impl FnOnce(EmbeddingResponse) -> EmbeddingResponse), HookError> {
        let mut events = Vec::new();
        let mut digest = PolicyDigest::new();
        let mut tails = Vec::new();

        for hook in &self.hooks {
            let (outcome, tail) = hook.on_embedding(request).await?;
            for event in &outcome.events {
                if let Some(sample) = &event.sample {
                    digest.feed(sample, hook.identity());
                }
            }
            events.extend(outcome.events);
            request = outcome.body;
            tails.push(tail);
        }

        let combined = move |mut response: EmbeddingResponse| {
            for tail in tails {
                response = tail(response);
            }
            response
        };

        Ok((request, PolicyOutcome { events, digest: digest.finish(), token_map: None }, combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{InvisibleTextAction, InvisibleTextHook, LanguageAction, LanguagesHook};
    use crate::nlp::HeuristicLanguageDetector;
    use gateway_protocol::openai::chat_completions::{ChatMessage, ChatRole};
    use std::collections::HashSet;

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
    async fn hooks_run_in_order_and_events_accumulate() {
        let set = HookSet::new(vec![
            Arc::new(InvisibleTextHook { action: InvisibleTextAction::Sanitization }),
            Arc::new(LanguagesHook {
                action: LanguageAction::Sanitization,
                allow: HashSet::new(),
                detector: Arc::new(HeuristicLanguageDetector),
            }),
        ]);
        let (rewritten, outcome, _tail) = set.apply_completion(request("hello\u{200B}world")).await.unwrap();
        assert_eq!(rewritten.messages[0].content.as_deref(), Some("helloworld"));
        assert_eq!(outcome.events.len(), 1);
        assert!(outcome.digest.is_some());
    }

    #[tokio::test]
    async fn no_events_means_no_digest() {
        let set = HookSet::new(vec![Arc::new(InvisibleTextHook { action: InvisibleTextAction::Ban })]);
        let (_, outcome, _tail) = set.apply_completion(request("clean text")).await.unwrap();
        assert!(outcome.events.is_empty());
        assert!(outcome.digest.is_none());
    }
}
