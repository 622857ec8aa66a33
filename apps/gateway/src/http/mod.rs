pub mod azureml;
pub mod openai;

use axum::routing::post;
use axum::Router;

use crate::state::AppState;

/// The two wire surfaces a deployment exposes: generic OpenAI-compatible
/// chat/embeddings, and Azure-ML score endpoints for the same pipeline.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/v1/embeddings", post(openai::embeddings))
        .route("/chat/score/{model}", post(azureml::chat_score))
        .route("/prompt/score/{model}", post(azureml::prompt_score))
        .route("/embedding/score/{model}", post(azureml::embedding_score))
        .with_state(state)
}
