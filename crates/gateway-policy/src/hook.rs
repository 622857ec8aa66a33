use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse};
use gateway_protocol::openai::embeddings::{EmbeddingRequest, EmbeddingResponse};

use crate::error::HookError;
use crate::event::PolicyEvent;

/// A hook's live token-to-original map, shared with the invoke pipeline
/// so a streaming response can be detokenized chunk-by-chunk instead of
/// only at the final, reconstructed response.
pub type TokenMap = Arc<Mutex<HashMap<String, String>>>;

/// Emitted alongside a hook's tail so the invoke pipeline can fold it
/// into the request's running policy-event list and digest.
pub struct HookOutcome<Body> {
    pub body: Body,
    pub events: Vec<PolicyEvent>,
    /// Set by a tokenizing hook; `None` for every other hook.
    pub token_map: Option<TokenMap>,
}

impl<Body> HookOutcome<Body> {
    pub fn unchanged(body: Body) -> Self {
        Self { body, events: Vec::new(), token_map: None }
    }
}

/// A post-processing step invoked with the final response, matching
/// the invoke pipeline's tail callback. Boxed so hooks can close over
/// per-request state (e.g. the PII hook's detokenizing map).
pub type CompletionTail = Box<dyn FnOnce(ChatCompletionResponse) -> ChatCompletionResponse + Send>;
pub type EmbeddingTail = Box<dyn FnOnce(EmbeddingResponse) -> EmbeddingResponse + Send>;

fn identity_completion_tail() -> CompletionTail {
    Box::new(|r| r)
}

fn identity_embedding_tail() -> EmbeddingTail {
    Box::new(|r| r)
}

/// One content-policy control. Every method has a
/// pass-through default so a hook implements only what it cares about.
#[async_trait]
pub trait Hook: Send + Sync {
    fn identity(&self) -> &'static str;

    async fn on_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<(HookOutcome<ChatCompletionRequest>, CompletionTail), HookError> {
        Ok((HookOutcome::unchanged(request), identity_completion_tail()))
    }

    async fn on_embedding(
        &self,
        request: EmbeddingRequest,
    ) -> Result<(HookOutcome<EmbeddingRequest>, EmbeddingTail), HookError> {
        Ok((HookOutcome::unchanged(request), identity_embedding_tail()))
    }
}
