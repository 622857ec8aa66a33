use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;

use gateway_core::{invoke_completion, invoke_embedding, CompletionOutcome, EmbeddingOutcome, RequestContext};
use gateway_protocol::openai::chat_completions::ChatCompletionRequest;
use gateway_protocol::openai::embeddings::EmbeddingRequest;
use gateway_protocol::sse;
use gateway_provider_core::ChatStream;

use crate::error_response::gateway_error_response;
use crate::state::AppState;

/// `POST /v1/chat/completions`: OpenAI-compatible, streaming or not.
pub async fn chat_completions(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ChatCompletionRequest>) -> Response {
    let key = match state.auth.authenticate(&headers).await {
        Ok(key) => key,
        Err(err) => return gateway_error_response(err),
    };
    let mut ctx = match RequestContext::from_apikey(key, state.deps.clone()).await {
        Ok(ctx) => ctx,
        Err(err) => return gateway_error_response(err),
    };
    ctx.request_id = Some(uuid::Uuid::now_v7().to_string());

    match invoke_completion(&mut ctx, body).await {
        Ok(CompletionOutcome::Full(response)) => Json(response).into_response(),
        Ok(CompletionOutcome::Instant(payload)) => Json(payload).into_response(),
        Ok(CompletionOutcome::Stream(stream)) => sse_response(stream),
        Err(err) => gateway_error_response(err),
    }
}

/// `POST /v1/embeddings`: OpenAI-compatible, never streams.
pub async fn embeddings(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<EmbeddingRequest>) -> Response {
    let key = match state.auth.authenticate(&headers).await {
        Ok(key) => key,
        Err(err) => return gateway_error_response(err),
    };
    let mut ctx = match RequestContext::from_apikey(key, state.deps.clone()).await {
        Ok(ctx) => ctx,
        Err(err) => return gateway_error_response(err),
    };
    ctx.request_id = Some(uuid::Uuid::now_v7().to_string());

    match invoke_embedding(&mut ctx, body).await {
        Ok(EmbeddingOutcome::Full(response)) => Json(response).into_response(),
        Ok(EmbeddingOutcome::Instant(payload)) => Json(payload).into_response(),
        Err(err) => gateway_error_response(err),
    }
}

/// Frames a `ChatStream` as `text/event-stream`, one `data:` event per
/// chunk, terminated by the literal `data: [DONE]` event.
fn sse_response(stream: ChatStream) -> Response {
    let body_stream = stream
        .map(|item| match item {
            Ok(chunk) => sse::encode_data_event(&serde_json::to_value(&chunk).unwrap_or_default()),
            Err(err) => sse::encode_data_event(&serde_json::json!({"error": {"message": err.message}})),
        })
        .chain(futures_util::stream::once(async { sse::done_event() }))
        .map(Ok::<_, Infallible>);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
