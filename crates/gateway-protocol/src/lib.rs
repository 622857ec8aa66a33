//! Client wire protocol: the OpenAI-compatible chat-completions /
//! embeddings shapes, the Azure-ML score shapes, the SSE codec, and the
//! gateway error body.

pub mod azureml;
pub mod error_body;
pub mod openai;
pub mod sse;

pub use error_body::{ErrorBody, ErrorDetail};
