use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use gateway_policy::HookError;
use gateway_protocol::openai::chat_completions::{ChatCompletionRequest, ChatCompletionResponse, ChatRole};
use gateway_protocol::openai::embeddings::{EmbeddingRequest, EmbeddingResponse};
use gateway_provider_core::{ChatStream, ProviderContext};
use gateway_storage::Storage;

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::stream::{TrackingStream, UntokenizingStream};

/// What `invoke_completion` hands back: a fully-built response, a live
/// stream of chunks, or the JSON payload of a hook's instant response.
pub enum CompletionOutcome {
    Full(ChatCompletionResponse),
    Stream(ChatStream),
    Instant(JsonValue),
}

pub enum EmbeddingOutcome {
    Full(EmbeddingResponse),
    Instant(JsonValue),
}

/// Merges a hook's instant-response payloads into whatever policy
/// metadata a hook's tail already attached, rather than replacing it.
fn merge_policy_metadata(existing: Option<JsonValue>, policy_responses: &[JsonValue]) -> Option<JsonValue> {
    if policy_responses.is_empty() {
        return existing;
    }
    let mut items = match existing {
        Some(JsonValue::Array(items)) => items,
        Some(other) => vec![other],
        None => Vec::new(),
    };
    items.extend(policy_responses.iter().cloned());
    Some(JsonValue::Array(items))
}

fn estimate_prompt_tokens(body: &ChatCompletionRequest) -> f64 {
    let words: usize = body
        .messages
        .iter()
        .filter(|m| m.role == ChatRole::User)
        .filter_map(|m| m.content.as_deref())
        .map(|content| content.split_whitespace().count())
        .sum();
    words as f64 / 0.75
}

/// Rejects with `UnbudgetedLlmError`/`PromptLimitError` before a
/// provider is ever called for this candidate.
async fn preflight<S: Storage>(
    ctx: &RequestContext<S>,
    provider_id: i64,
    body: &ChatCompletionRequest,
) -> Result<(), GatewayError> {
    if let Some(doc) = ctx.deps.config.find_provider(provider_id).await? {
        if let Some(unbudgeted_until) = doc.unbudgeted_until {
            let now = OffsetDateTime::now_utc();
            if unbudgeted_until > now {
                let delta = (unbudgeted_until - now).as_seconds_f64();
                return Err(GatewayError::UnbudgetedLlm { delta });
            }
        }
    }
    if let Some(limit) = ctx.key.max_prompt_tokens {
        if estimate_prompt_tokens(body) > limit as f64 {
            return Err(GatewayError::PromptLimit { limit });
        }
    }
    Ok(())
}

async fn record_candidate_error<S: Storage>(ctx: &RequestContext<S>, err: &GatewayError) -> Result<(), GatewayError> {
    let draft = ctx.create_usage();
    let body = err.openai_body();
    let record = draft.set_error(
        &body.error.message,
        &body.error.kind,
        err.status().as_u16(),
        matches!(err, GatewayError::Internal(_)),
        &ctx.policy_events_snapshot(),
        ctx.policy_digest_snapshot(),
    );
    ctx.deps.storage.insert_usage_record(record).await?;
    Ok(())
}

/// The six-step pipeline: resolve candidates, run hooks, try each
/// candidate in order with failover, wrap streaming responses, attach
/// policy/cost metadata, and record usage.
pub async fn invoke_completion<S: Storage + 'static>(
    ctx: &mut RequestContext<S>,
    body: ChatCompletionRequest,
) -> Result<CompletionOutcome, GatewayError> {
    let (_resolved_name, candidates) = ctx.select(&body.model)?;

    let hooks = ctx.hooks.clone();
    let hook_result = hooks.apply_completion(body).await;
    let (body, outcome, tail) = match hook_result {
        Ok(v) => v,
        Err(HookError::InstantApiResponse(payload)) => {
            ctx.policy_responses.push(payload.clone());
            let draft = ctx.create_usage();
            let record = draft.set_model_usage(0, 0, 0.0, 0.0, &[], None);
            ctx.deps.storage.insert_usage_record(record).await?;
            return Ok(CompletionOutcome::Instant(payload));
        }
        Err(other) => return Err(other.into()),
    };
    ctx.record_policy_outcome(&outcome);
    let token_map = outcome.token_map.clone();
    let wants_stream = body.stream.unwrap_or(false);

    let mut last_err: Option<GatewayError> = None;
    for (info, provider) in candidates {
        ctx.current = Some((info.clone(), provider.clone()));

        if let Err(err) = preflight(ctx, info.provider_id, &body).await {
            record_candidate_error(ctx, &err).await?;
            last_err = Some(err);
            continue;
        }

        let mut provider_body = body.clone();
        provider_body.model = info.model_name.clone();
        let provider_ctx = ProviderContext {
            trace_id: ctx.request_id.clone().unwrap_or_default(),
            provider_id: info.provider_id,
            model_name: info.model_name.clone(),
        };

        if wants_stream {
            match provider.completion_stream(&provider_ctx, &provider_body).await {
                Ok(raw_stream) => {
                    let stream = match &token_map {
                        Some(map) => Box::pin(UntokenizingStream::new(raw_stream, map.clone())) as ChatStream,
                        None => raw_stream,
                    };
                    let draft = ctx.create_usage();
                    let policy_events = ctx.policy_events_snapshot();
                    let policy_digest = ctx.policy_digest_snapshot();
                    let storage = ctx.deps.storage.clone();
                    let price_input = info.price_input;
                    let price_output = info.price_output;
                    let tracking = TrackingStream::new(
                        stream,
                        Box::new(move |response| {
                            Box::pin(async move {
                                let response = tail(response);
                                let (prompt_tokens, completion_tokens) = response
                                    .usage
                                    .map(|u| (u.prompt_tokens, u.completion_tokens))
                                    .unwrap_or((0, 0));
                                let record = draft.set_model_usage(
                                    prompt_tokens,
                                    completion_tokens,
                                    prompt_tokens as f64 * price_input,
                                    completion_tokens as f64 * price_output,
                                    &policy_events,
                                    policy_digest,
                                );
                                let _ = storage.insert_usage_record(record).await;
                            })
                        }),
                    );
                    return Ok(CompletionOutcome::Stream(Box::pin(tracking)));
                }
                Err(provider_err) => {
                    let err: GatewayError = provider_err.into();
                    record_candidate_error(ctx, &err).await?;
                    last_err = Some(err);
                    continue;
                }
            }
        }

        match provider.completion(&provider_ctx, &provider_body).await {
            Ok(response) => {
                let mut response = tail(response);
                response.trussed_controller_policy =
                    merge_policy_metadata(response.trussed_controller_policy.take(), &ctx.policy_responses);
                let (prompt_tokens, completion_tokens) =
                    response.usage.as_ref().map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));
                let prompt_cost = prompt_tokens as f64 * info.price_input;
                let completion_cost = completion_tokens as f64 * info.price_output;
                let draft = ctx.create_usage();
                let record = draft.set_model_usage(
                    prompt_tokens,
                    completion_tokens,
                    prompt_cost,
                    completion_cost,
                    &ctx.policy_events_snapshot(),
                    ctx.policy_digest_snapshot(),
                );
                ctx.deps.storage.insert_usage_record(record).await?;
                if let Some((remaining, spent)) = ctx.budget_summary(info.provider_id) {
                    response.remaining = Some(remaining);
                    response.spent = Some(spent);
                }
                return Ok(CompletionOutcome::Full(response));
            }
            Err(provider_err) => {
                let err: GatewayError = provider_err.into();
                record_candidate_error(ctx, &err).await?;
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| GatewayError::UnlistedModel { requested: ctx.key.key_suffix.clone() }))
}

/// Mirrors `invoke_completion` for the non-streaming embeddings path;
/// embeddings never stream, so there is no tracking-stream branch.
pub async fn invoke_embedding<S: Storage + 'static>(
    ctx: &mut RequestContext<S>,
    body: EmbeddingRequest,
) -> Result<EmbeddingOutcome, GatewayError> {
    let (_resolved_name, candidates) = ctx.select(&body.model)?;

    let hooks = ctx.hooks.clone();
    let hook_result = hooks.apply_embedding(body).await;
    let (body, outcome, tail) = match hook_result {
        Ok(v) => v,
        Err(HookError::InstantApiResponse(payload)) => {
            ctx.policy_responses.push(payload.clone());
            let draft = ctx.create_usage();
            let record = draft.set_model_usage(0, 0, 0.0, 0.0, &[], None);
            ctx.deps.storage.insert_usage_record(record).await?;
            return Ok(EmbeddingOutcome::Instant(payload));
        }
        Err(other) => return Err(other.into()),
    };
    ctx.record_policy_outcome(&outcome);

    let mut last_err: Option<GatewayError> = None;
    for (info, provider) in candidates {
        ctx.current = Some((info.clone(), provider.clone()));

        let prompt_words: usize = body.input.as_strings().iter().map(|text| text.split_whitespace().count()).sum();
        if let Some(limit) = ctx.key.max_prompt_tokens {
            if (prompt_words as f64 / 0.75) > limit as f64 {
                let err = GatewayError::PromptLimit { limit };
                record_candidate_error(ctx, &err).await?;
                last_err = Some(err);
                continue;
            }
        }

        let mut provider_body = body.clone();
        provider_body.model = info.model_name.clone();
        let provider_ctx = ProviderContext {
            trace_id: ctx.request_id.clone().unwrap_or_default(),
            provider_id: info.provider_id,
            model_name: info.model_name.clone(),
        };

        match provider.embedding(&provider_ctx, &provider_body).await {
            Ok(response) => {
                let mut response = tail(response);
                let prompt_tokens = response.usage.prompt_tokens;
                let prompt_cost = prompt_tokens as f64 * info.price_input;
                let draft = ctx.create_usage();
                let record = draft.set_model_usage(
                    prompt_tokens,
                    0,
                    prompt_cost,
                    0.0,
                    &ctx.policy_events_snapshot(),
                    ctx.policy_digest_snapshot(),
                );
                ctx.deps.storage.insert_usage_record(record).await?;
                if let Some((remaining, spent)) = ctx.budget_summary(info.provider_id) {
                    response.remaining = Some(remaining);
                    response.spent = Some(spent);
                }
                return Ok(EmbeddingOutcome::Full(response));
            }
            Err(provider_err) => {
                let err: GatewayError = provider_err.into();
                record_candidate_error(ctx, &err).await?;
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| GatewayError::UnlistedModel { requested: ctx.key.key_suffix.clone() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_tokens_from_user_message_word_count() {
        let body = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![gateway_protocol::openai::chat_completions::ChatMessage {
                role: ChatRole::User,
                content: Some("one two three four".into()),
                name: None,
                tool_calls: None,
            }],
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
        assert!((estimate_prompt_tokens(&body) - (4.0 / 0.75)).abs() < 1e-9);
    }

    #[test]
    fn merge_policy_metadata_appends_rather_than_overwrites() {
        let existing = Some(serde_json::json!({"code_provenance": []}));
        let merged = merge_policy_metadata(existing, &[serde_json::json!({"pii": true})]);
        assert_eq!(merged.unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn merge_policy_metadata_is_none_when_both_are_empty() {
        assert!(merge_policy_metadata(None, &[]).is_none());
    }
}
