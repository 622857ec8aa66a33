use std::collections::BTreeMap;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::Stream;

use gateway_protocol::openai::chat_completions::{
    ChatCompletionChoice, ChatCompletionChunk, ChatCompletionResponse, ChatMessage, ChatRole, Usage,
};
use gateway_provider_core::{ChatStream, ProviderError};

struct AccumulatedChoice {
    role: ChatRole,
    content: String,
    finish_reason: Option<String>,
}

/// Rebuilds a non-streaming-shaped response out of every chunk seen so
/// far, so the end-of-stream finisher can run the same tail/usage logic
/// as the non-streaming path.
struct StreamAccumulator {
    id: String,
    model: String,
    created: i64,
    choices: BTreeMap<i64, AccumulatedChoice>,
    usage: Option<Usage>,
}

impl StreamAccumulator {
    fn new() -> Self {
        Self { id: String::new(), model: String::new(), created: 0, choices: BTreeMap::new(), usage: None }
    }

    fn absorb(&mut self, chunk: &ChatCompletionChunk) {
        if self.id.is_empty() {
            self.id = chunk.id.clone();
            self.created = chunk.created;
        }
        if !chunk.model.is_empty() {
            self.model = chunk.model.clone();
        }
        if let Some(usage) = &chunk.usage {
            self.usage = Some(usage.clone());
        }
        for choice in &chunk.choices {
            let entry = self.choices.entry(choice.index).or_insert_with(|| AccumulatedChoice {
                role: ChatRole::Assistant,
                content: String::new(),
                finish_reason: None,
            });
            if let Some(role) = choice.delta.role {
                entry.role = role;
            }
            if let Some(content) = &choice.delta.content {
                entry.content.push_str(content);
            }
            if choice.finish_reason.is_some() {
                entry.finish_reason = choice.finish_reason.clone();
            }
        }
    }

    fn build(self) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: self.id,
            object: "chat.completion".to_string(),
            created: self.created,
            model: self.model,
            choices: self
                .choices
                .into_iter()
                .map(|(index, choice)| ChatCompletionChoice {
                    index,
                    message: ChatMessage { role: choice.role, content: Some(choice.content), name: None, tool_calls: None },
                    finish_reason: choice.finish_reason,
                })
                .collect(),
            usage: self.usage,
            trussed_controller_policy: None,
            remaining: None,
            spent: None,
        }
    }
}

type Finisher = Box<dyn FnOnce(ChatCompletionResponse) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Yields every upstream chunk verbatim while accumulating them; once
/// the upstream stream ends, spawns the finisher against the
/// reconstructed response (tail application + usage-record insert are
/// the finisher's job, not this adapter's).
pub struct TrackingStream {
    inner: ChatStream,
    accumulator: Option<StreamAccumulator>,
    finisher: Option<Finisher>,
    finished: bool,
}

impl TrackingStream {
    pub fn new(inner: ChatStream, finisher: Finisher) -> Self {
        Self { inner, accumulator: Some(StreamAccumulator::new()), finisher: Some(finisher), finished: false }
    }
}

impl Stream for TrackingStream {
    type Item = Result<ChatCompletionChunk, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(acc) = self.accumulator.as_mut() {
                    acc.absorb(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                self.finished = true;
                if let (Some(acc), Some(finisher)) = (self.accumulator.take(), self.finisher.take()) {
                    let response = acc.build();
                    tokio::spawn(finisher(response));
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

const TAG_CHAR: char = '\u{0394}';
const TOKEN_CHARS: usize = 13; // the tag char plus twelve hex digits

/// Per-choice buffering state machine that substitutes `Δ<12-hex>`
/// tokens back to their original text as chunks arrive.
#[derive(Default)]
struct Untokenizer {
    pending: Option<String>,
}

impl Untokenizer {
    fn process(&mut self, text: &str, map: &HashMap<String, String>) -> String {
        let mut out = String::new();
        for c in text.chars() {
            if let Some(buf) = self.pending.as_mut() {
                if c == TAG_CHAR && buf.chars().count() > 1 {
                    out.push_str(buf);
                    self.pending = Some(c.to_string());
                    continue;
                }
                buf.push(c);
                if buf.chars().count() == TOKEN_CHARS {
                    let token = self.pending.take().unwrap();
                    match map.get(&token) {
                        Some(original) => out.push_str(original),
                        None => out.push_str(&token),
                    }
                }
                continue;
            }
            if c == TAG_CHAR {
                self.pending = Some(c.to_string());
            } else {
                out.push(c);
            }
        }
        out
    }

    fn flush(&mut self) -> String {
        self.pending.take().unwrap_or_default()
    }
}

/// Wraps a `TrackingStream` (or any `ChatStream`) to detokenize PII
/// placeholders inline, preserving per-choice chunk indexing. Once the
/// upstream stream ends, if any substitution happened, emits one extra
/// synthetic chunk carrying `U+200E` before signalling end-of-stream —
/// matching "text followed by U+200E, then DONE".
pub struct UntokenizingStream {
    inner: ChatStream,
    map: Arc<Mutex<HashMap<String, String>>>,
    per_choice: HashMap<i64, Untokenizer>,
    substituted: bool,
    ended: bool,
}

impl UntokenizingStream {
    pub fn new(inner: ChatStream, map: Arc<Mutex<HashMap<String, String>>>) -> Self {
        Self { inner, map, per_choice: HashMap::new(), substituted: false, ended: false }
    }
}

impl Stream for UntokenizingStream {
    type Item = Result<ChatCompletionChunk, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.ended {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(mut chunk))) => {
                let map = self.map.lock().unwrap().clone();
                for choice in &mut chunk.choices {
                    if let Some(content) = &choice.delta.content {
                        let before = content.clone();
                        let untokenizer = self.per_choice.entry(choice.index).or_default();
                        let replaced = untokenizer.process(&before, &map);
                        if replaced != before {
                            self.substituted = true;
                        }
                        choice.delta.content = Some(replaced);
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                for (_, untokenizer) in self.per_choice.iter_mut() {
                    let _ = untokenizer.flush();
                }
                self.ended = true;
                if self.substituted {
                    use gateway_protocol::openai::chat_completions::{ChunkChoice, ChunkChoiceDelta};
                    let marker = ChatCompletionChunk {
                        id: String::new(),
                        object: "chat.completion.chunk".to_string(),
                        created: 0,
                        model: String::new(),
                        choices: vec![ChunkChoice {
                            index: 0,
                            delta: ChunkChoiceDelta { role: None, content: Some("\u{200E}".to_string()) },
                            finish_reason: None,
                        }],
                        usage: None,
                    };
                    return Poll::Ready(Some(Ok(marker)));
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunk(index: i64, content: &str) -> ChatCompletionChunk {
        use gateway_protocol::openai::chat_completions::{ChunkChoice, ChunkChoiceDelta};
        ChatCompletionChunk {
            id: "c1".into(),
            object: "chat.completion.chunk".into(),
            created: 0,
            model: "m".into(),
            choices: vec![ChunkChoice {
                index,
                delta: ChunkChoiceDelta { role: None, content: Some(content.to_string()) },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    fn boxed(chunks: Vec<Result<ChatCompletionChunk, ProviderError>>) -> ChatStream {
        Box::pin(stream::iter(chunks))
    }

    #[tokio::test]
    async fn tracking_stream_passes_chunks_through_verbatim() {
        use futures_util::StreamExt;
        let chunks = vec![Ok(chunk(0, "hello")), Ok(chunk(0, " world"))];
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let finisher: Finisher = Box::new(move |response| {
            let tx = tx.clone();
            Box::pin(async move {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(response);
                }
            })
        });
        let mut tracking = TrackingStream::new(boxed(chunks), finisher);
        let mut seen = Vec::new();
        while let Some(item) = tracking.next().await {
            seen.push(item.unwrap());
        }
        assert_eq!(seen.len(), 2);
        let built = rx.await.unwrap();
        assert_eq!(built.choices[0].message.content.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn untokenizing_stream_restores_original_across_chunk_boundary() {
        use futures_util::StreamExt;
        let map = Arc::new(Mutex::new(HashMap::new()));
        map.lock().unwrap().insert("\u{0394}000000000001".to_string(), "078-05-1120".to_string());

        let chunks = vec![
            Ok(chunk(0, "ssn is \u{0394}0000")),
            Ok(chunk(0, "00000001 .")),
        ];
        let mut untokenizing = UntokenizingStream::new(boxed(chunks), map);
        let mut out = String::new();
        while let Some(item) = untokenizing.next().await {
            let chunk = item.unwrap();
            if let Some(content) = &chunk.choices[0].delta.content {
                out.push_str(content);
            }
        }
        assert_eq!(out, "ssn is 078-05-1120 .\u{200e}");
    }

    #[tokio::test]
    async fn untokenizing_stream_leaves_unmapped_tokens_raw() {
        use futures_util::StreamExt;
        let map = Arc::new(Mutex::new(HashMap::new()));
        let chunks = vec![Ok(chunk(0, "token \u{0394}aaaaaaaaaaaa end"))];
        let mut untokenizing = UntokenizingStream::new(boxed(chunks), map);
        let mut out = String::new();
        while let Some(item) = untokenizing.next().await {
            let chunk = item.unwrap();
            if let Some(content) = &chunk.choices[0].delta.content {
                out.push_str(content);
            }
        }
        assert_eq!(out, "token \u{0394}aaaaaaaaaaaa end");
    }
}
