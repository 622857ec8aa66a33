use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatRole};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::HookError;
use crate::event::PolicyEvent;
use crate::hook::{CompletionTail, Hook, HookOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvisibleTextAction {
    Sanitization,
    Ban,
}

pub struct InvisibleTextHook {
    pub action: InvisibleTextAction,
}

fn invisible_char_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unicode general categories Cf (format), Co (private use), Cn
    // (unassigned) are not directly expressible as \p{} classes in the
    // `regex` crate without the `unicode-perl`/`unicode-gencat`
    // feature's category tables; Cf and Co are, Cn (unassigned) is
    // approximated by the common invisible/format code points actually
    // seen in prompt-injection payloads.
    RE.get_or_init(|| Regex::new(r"[\p{Cf}\p{Co}\u{FFF9}-\u{FFFB}]").unwrap())
}

#[async_trait]
impl Hook for InvisibleTextHook {
    fn identity(&self) -> &'static str {
        "invisible_text"
    }

    async fn on_completion(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<(HookOutcome<ChatCompletionRequest>, CompletionTail), HookError> {
        let re = invisible_char_regex();
        let mut events = Vec::new();

        for message in request.messages.iter_mut() {
            if message.role != ChatRole::User {
                continue;
            }
            let Some(content) = message.content.as_ref() else { continue };
            if !re.is_match(content) {
                continue;
            }

            match self.action {
                InvisibleTextAction::Ban => return Err(HookError::InvisibleText),
                InvisibleTextAction::Sanitization => {
                    let sample: String = re.find_iter(content).map(|m| m.as_str()).collect();
                    events.push(PolicyEvent::new(2, "invisible_text", Some(&sample)));
                    message.content = Some(re.replace_all(content, "").into_owned());
                }
            }
        }

        Ok((HookOutcome { body: request, events, token_map: None }, Box::new(|r| r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_protocol::openai::chat_completions::ChatMessage;

    fn request_with(content: &str) -> ChatCompletionRequest {
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
    async fn sanitization_strips_invisible_characters() {
        let hook = InvisibleTextHook { action: InvisibleTextAction::Sanitization };
        let request = request_with("hello\u{200B}world");
        let (outcome, _) = hook.on_completion(request).await.unwrap();
        assert_eq!(outcome.body.messages[0].content.as_deref(), Some("helloworld"));
        assert_eq!(outcome.events.len(), 1);
    }

    #[tokio::test]
    async fn ban_rejects_any_match() {
        let hook = InvisibleTextHook { action: InvisibleTextAction::Ban };
        let request = request_with("hello\u{200B}world");
        assert!(matches!(hook.on_completion(request).await, Err(HookError::InvisibleText)));
    }

    #[tokio::test]
    async fn clean_text_passes_through() {
        let hook = InvisibleTextHook { action: InvisibleTextAction::Ban };
        let request = request_with("hello world");
        let (outcome, _) = hook.on_completion(request).await.unwrap();
        assert!(outcome.events.is_empty());
    }
}
