use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse};
use regex::Regex;

use crate::error::HookError;
use crate::hook::{CompletionTail, Hook, HookOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceMatch {
    pub url: String,
    pub licenses: Vec<String>,
}

/// One language's lookup against a corpus of known snippets. Real
/// deployments back this with something like a code-search index; no
/// such crate exists in this workspace, so callers provide their own.
pub trait SnippetScanner: Send + Sync {
    fn language(&self) -> &'static str;
    fn scan(&self, code: &str) -> Option<ProvenanceMatch>;
}

#[derive(Debug, Clone)]
pub struct CodeProvenanceOptions {
    /// Scan every fenced block regardless of language tag, instead of
    /// only the languages a configured scanner covers.
    pub fullscan: bool,
    /// Append a footnote listing sources/licenses to the assistant
    /// message that contained a match.
    pub footnote: bool,
    /// Record matches on the response's policy metadata field.
    pub record_metadata: bool,
}

pub struct CodeProvenanceHook {
    pub options: CodeProvenanceOptions,
    pub scanners: Vec<Arc<dyn SnippetScanner>>,
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([A-Za-z0-9_+-]*)\n(.*?)```").unwrap())
}

struct FencedBlock<'a> {
    language: &'a str,
    code: &'a str,
}

fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    fence_regex()
        .captures_iter(text)
        .map(|c| {
            let language = c.get(1).map(|m| m.as_str()).unwrap_or("");
            let code = c.get(2).map(|m| m.as_str()).unwrap_or("");
            FencedBlock { language, code }
        })
        .collect()
}

impl CodeProvenanceHook {
    fn scanners_for<'a>(&'a self, language: &str) -> Vec<&'a Arc<dyn SnippetScanner>> {
        if self.options.fullscan {
            self.scanners.iter().collect()
        } else {
            self.scanners.iter().filter(|s| s.language().eq_ignore_ascii_case(language)).collect()
        }
    }
}

#[async_trait]
impl Hook for CodeProvenanceHook {
    fn identity(&self) -> &'static str {
        "code_provenance"
    }

    async fn on_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<(HookOutcome<ChatCompletionRequest>, CompletionTail), HookError> {
        if self.scanners.is_empty() {
            return Ok((HookOutcome::unchanged(request), Box::new(|r| r)));
        }

        let footnote = self.options.footnote;
        let record_metadata = self.options.record_metadata;
        let scanners: Vec<Arc<dyn SnippetScanner>> = self.scanners.clone();
        let fullscan = self.options.fullscan;

        let tail: CompletionTail = Box::new(move |mut response: ChatCompletionResponse| {
            let hook = CodeProvenanceHook {
                options: CodeProvenanceOptions { fullscan, footnote, record_metadata },
                scanners,
            };
            let mut all_matches = Vec::new();

            for choice in response.choices.iter_mut() {
                let Some(content) = choice.message.content.clone() else { continue };
                let mut matches = Vec::new();
                for block in fenced_blocks(&content) {
                    for scanner in hook.scanners_for(block.language) {
                        if let Some(found) = scanner.scan(block.code) {
                            matches.push(found);
                        }
                    }
                }
                if matches.is_empty() {
                    continue;
                }
                if footnote {
                    let lines: Vec<String> = matches
                        .iter()
                        .map(|m| format!("- {} ({})", m.url, m.licenses.join(", ")))
                        .collect();
                    let note = format!("\n\n---\nSimilar code found:\n{}", lines.join("\n"));
                    choice.message.content = Some(format!("{content}{note}"));
                }
                all_matches.extend(matches);
            }

            if record_metadata && !all_matches.is_empty() {
                let value = serde_json::json!(all_matches
                    .iter()
                    .map(|m| serde_json::json!({ "url": m.url, "licenses": m.licenses }))
                    .collect::<Vec<_>>());
                response.trussed_controller_policy = Some(serde_json::json!({ "code_provenance": value }));
            }

            response
        });

        Ok((HookOutcome::unchanged(request), tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_protocol::openai::chat_completions::{ChatCompletionChoice, ChatMessage, ChatRole};

    struct FixedScanner;
    impl SnippetScanner for FixedScanner {
        fn language(&self) -> &'static str {
            "python"
        }
        fn scan(&self, code: &str) -> Option<ProvenanceMatch> {
            if code.contains("quicksort") {
                Some(ProvenanceMatch { url: "https://example.com/gist/1".into(), licenses: vec!["MIT".into()] })
            } else {
                None
            }
        }
    }

    fn response(content: &str) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: "r".into(),
            object: "chat.completion".into(),
            created: 0,
            model: "m".into(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage { role: ChatRole::Assistant, content: Some(content.to_string()), name: None, tool_calls: None },
                finish_reason: Some("stop".into()),
            }],
            usage: None,
            trussed_controller_policy: None,
            remaining: None,
            spent: None,
        }
    }

    #[tokio::test]
    async fn matching_snippet_gets_a_footnote_and_metadata() {
        let hook = CodeProvenanceHook {
            options: CodeProvenanceOptions { fullscan: false, footnote: true, record_metadata: true },
            scanners: vec![Arc::new(FixedScanner)],
        };
        let request = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![],
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
        let (_, tail) = hook.on_completion(request).await.unwrap();
        let body = "```python\ndef quicksort(xs): ...\n```";
        let result = tail(response(body));
        let content = result.choices[0].message.content.as_ref().unwrap();
        assert!(content.contains("Similar code found"));
        assert!(result.trussed_controller_policy.is_some());
    }

    #[tokio::test]
    async fn unmatched_snippet_is_left_alone() {
        let hook = CodeProvenanceHook {
            options: CodeProvenanceOptions { fullscan: false, footnote: true, record_metadata: true },
            scanners: vec![Arc::new(FixedScanner)],
        };
        let request = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![],
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
        let (_, tail) = hook.on_completion(request).await.unwrap();
        let body = "```python\nprint('hi')\n```";
        let result = tail(response(body));
        assert_eq!(result.choices[0].message.content.as_deref(), Some(body));
        assert!(result.trussed_controller_policy.is_none());
    }
}
