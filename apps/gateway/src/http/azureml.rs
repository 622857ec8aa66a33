use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use gateway_core::{invoke_completion, invoke_embedding, CompletionOutcome, EmbeddingOutcome, RequestContext};
use gateway_protocol::azureml::{
    ChatScoreRequest, EmbeddingScoreOutput, EmbeddingScoreRequest, PromptScoreRequest, ScoreTextOutput,
};
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatMessage, ChatRole};
use gateway_protocol::openai::embeddings::{EmbeddingInput, EmbeddingRequest};

use crate::error_response::gateway_error_response;
use crate::state::AppState;

fn parse_role(raw: &str) -> ChatRole {
    match raw.to_ascii_lowercase().as_str() {
        "system" => ChatRole::System,
        "assistant" => ChatRole::Assistant,
        "tool" => ChatRole::Tool,
        _ => ChatRole::User,
    }
}

fn assistant_text(response: &gateway_protocol::openai::chat_completions::ChatCompletionResponse) -> String {
    response.choice_texts().join("")
}

async fn authenticated_ctx(state: &AppState, headers: &HeaderMap) -> Result<RequestContext<gateway_storage::SeaOrmStorage>, gateway_core::GatewayError> {
    let key = state.auth.authenticate(headers).await?;
    let mut ctx = RequestContext::from_apikey(key, state.deps.clone()).await?;
    ctx.request_id = Some(uuid::Uuid::now_v7().to_string());
    Ok(ctx)
}

/// `POST /chat/score/{model}`: an Azure-ML scoring endpoint wrapping a
/// full chat-completion request; the non-streaming response collapses
/// to `{"output": "<assistant text>"}`.
pub async fn chat_score(
    State(state): State<AppState>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ChatScoreRequest>,
) -> Response {
    let mut ctx = match authenticated_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(err) => return gateway_error_response(err),
    };

    let messages = body
        .input_data
        .input_string
        .into_iter()
        .map(|m| ChatMessage { role: parse_role(&m.role), content: Some(m.content), name: None, tool_calls: None })
        .collect();
    let request = ChatCompletionRequest {
        model,
        messages,
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

    match invoke_completion(&mut ctx, request).await {
        Ok(CompletionOutcome::Full(response)) => Json(ScoreTextOutput { output: assistant_text(&response) }).into_response(),
        Ok(CompletionOutcome::Instant(payload)) => Json(payload).into_response(),
        Ok(CompletionOutcome::Stream(_)) => Json(ScoreTextOutput { output: String::new() }).into_response(),
        Err(err) => gateway_error_response(err),
    }
}

/// `POST /prompt/score/{model}`: a single-string prompt, sent as one
/// user message; responds the same `{"output": "..."}` shape.
pub async fn prompt_score(
    State(state): State<AppState>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PromptScoreRequest>,
) -> Response {
    let mut ctx = match authenticated_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(err) => return gateway_error_response(err),
    };

    let request = ChatCompletionRequest {
        model,
        messages: vec![ChatMessage { role: ChatRole::User, content: Some(body.prompt), name: None, tool_calls: None }],
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

    match invoke_completion(&mut ctx, request).await {
        Ok(CompletionOutcome::Full(response)) => Json(ScoreTextOutput { output: assistant_text(&response) }).into_response(),
        Ok(CompletionOutcome::Instant(payload)) => Json(payload).into_response(),
        Ok(CompletionOutcome::Stream(_)) => Json(ScoreTextOutput { output: String::new() }).into_response(),
        Err(err) => gateway_error_response(err),
    }
}

/// `POST /embedding/score/{model}`: a list of documents, responding the
/// raw vector list (no `object`/`index` wrapper, per the Azure-ML shape).
pub async fn embedding_score(
    State(state): State<AppState>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<EmbeddingScoreRequest>,
) -> Response {
    let mut ctx = match authenticated_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(err) => return gateway_error_response(err),
    };

    let request = EmbeddingRequest { model, input: EmbeddingInput::Many(body.documents), user: None };

    match invoke_embedding(&mut ctx, request).await {
        Ok(EmbeddingOutcome::Full(response)) => {
            let out: EmbeddingScoreOutput = response.data.into_iter().map(|d| d.embedding).collect();
            Json(out).into_response()
        }
        Ok(EmbeddingOutcome::Instant(payload)) => Json(payload).into_response(),
        Err(err) => gateway_error_response(err),
    }
}
