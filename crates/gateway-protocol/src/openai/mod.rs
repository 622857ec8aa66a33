pub mod chat_completions;
pub mod embeddings;

pub use chat_completions::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole,
};
pub use embeddings::{EmbeddingRequest, EmbeddingResponse};
