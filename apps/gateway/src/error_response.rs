use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;

use gateway_core::GatewayError;

/// Builds the OpenAI-shaped `{"error": {...}}` body and status for a
/// pipeline failure, attaching `Retry-After` when the error carries one.
pub fn gateway_error_response(err: GatewayError) -> Response {
    let status = err.status();
    let body = err.openai_body();
    let retry_after = err.retry_after_secs();
    let mut response = (status, Json(body)).into_response();
    if let Some(secs) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
