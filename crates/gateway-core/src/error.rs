use http::StatusCode;

use gateway_pool::PoolError;
use gateway_policy::HookError;
use gateway_protocol::ErrorBody;
use gateway_provider_core::ProviderError;

/// Everything that can stop the invoke pipeline short of a successful
/// response, carrying enough to build both the HTTP status and the
/// OpenAI-shaped error body in one place.
#[derive(Debug)]
pub enum GatewayError {
    Validation(String),
    MissingAuth,
    InvalidAuth,
    ExpiredKey,
    BudgetSuspended { delta_secs: f64 },
    RateLimited { retry_after_secs: f64 },
    Policy { code: &'static str, message: String },
    UnlistedModel { requested: String },
    UnknownProvider { provider: String },
    UnsupportedFeatures,
    ResourceNotReady { resource: String },
    UnbudgetedLlm { delta: f64 },
    PromptLimit { limit: i64 },
    Provider(ProviderError),
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::MissingAuth | GatewayError::InvalidAuth | GatewayError::ExpiredKey => StatusCode::UNAUTHORIZED,
            GatewayError::BudgetSuspended { .. } | GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Policy { .. } => StatusCode::BAD_REQUEST,
            GatewayError::UnlistedModel { .. } | GatewayError::UnknownProvider { .. } | GatewayError::UnsupportedFeatures => {
                StatusCode::NOT_FOUND
            }
            GatewayError::ResourceNotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UnbudgetedLlm { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::PromptLimit { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Provider(e) => StatusCode::from_u16(e.http_code).unwrap_or(StatusCode::BAD_GATEWAY),
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `Retry-After` header value in whole seconds, when this error
    /// carries one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimited { retry_after_secs } => Some(retry_after_secs.ceil() as u64),
            GatewayError::BudgetSuspended { delta_secs } => Some(delta_secs.ceil() as u64),
            _ => None,
        }
    }

    pub fn openai_body(&self) -> ErrorBody {
        match self {
            GatewayError::Validation(msg) => ordinary(msg, "invalid_request_error", None),
            GatewayError::MissingAuth => ordinary("missing bearer credential", "invalid_request_error", None),
            GatewayError::InvalidAuth => ordinary("invalid api key", "invalid_request_error", None),
            GatewayError::ExpiredKey => ordinary("api key has expired", "invalid_request_error", None),
            GatewayError::BudgetSuspended { delta_secs } => ordinary(
                format!("budget suspended for {delta_secs:.0}s"),
                "insufficient_quota",
                Some("budget_suspended".to_string()),
            ),
            GatewayError::RateLimited { retry_after_secs } => ordinary(
                format!("rate limit exceeded, retry after {retry_after_secs:.0}s"),
                "rate_limit_error",
                Some("rate_limited".to_string()),
            ),
            GatewayError::Policy { code, message } => ordinary(message, "invalid_request_error", Some(code.to_string())),
            GatewayError::UnlistedModel { requested } => {
                ordinary(format!("model '{requested}' is not available to this key"), "invalid_request_error", None)
            }
            GatewayError::UnknownProvider { provider } => {
                ordinary(format!("unknown provider '{provider}'"), "invalid_request_error", None)
            }
            GatewayError::UnsupportedFeatures => {
                ordinary("no candidate model supports the requested features", "invalid_request_error", None)
            }
            GatewayError::ResourceNotReady { resource } => ordinary(format!("{resource} is not ready"), "server_error", None),
            GatewayError::UnbudgetedLlm { delta } => ordinary(
                format!("this request would exceed the provider budget by {delta:.4}"),
                "insufficient_quota",
                Some("unbudgeted_llm".to_string()),
            ),
            GatewayError::PromptLimit { limit } => {
                ordinary(format!("prompt exceeds the {limit} token limit for this key"), "invalid_request_error", Some("prompt_limit".to_string()))
            }
            GatewayError::Provider(e) => ErrorBody::provider(e.message.clone(), e.openai_type.clone(), e.openai_code.clone()),
            GatewayError::Internal(_) => ordinary("internal error", "server_error", None),
        }
    }
}

fn ordinary(message: impl Into<String>, kind: &str, code: Option<String>) -> ErrorBody {
    ErrorBody::ordinary(message, kind, code)
}

impl From<ProviderError> for GatewayError {
    fn from(value: ProviderError) -> Self {
        GatewayError::Provider(value)
    }
}

impl From<HookError> for GatewayError {
    fn from(value: HookError) -> Self {
        match value {
            HookError::PromptInjection => GatewayError::Policy { code: "prompt_injection", message: "prompt injection detected".into() },
            HookError::UnallowedLanguage => {
                GatewayError::Policy { code: "unallowed_language", message: "message language is not allowed".into() }
            }
            HookError::InvisibleText => GatewayError::Policy { code: "invisible_text", message: "invisible text detected".into() },
            HookError::ForbiddenTopic(topic) => {
                GatewayError::Policy { code: "forbidden_topic", message: format!("forbidden topic: {topic}") }
            }
            HookError::PolicyIsNotReady(resource) => GatewayError::ResourceNotReady { resource },
            HookError::InstantApiResponse(_) => {
                GatewayError::Internal("InstantApiResponse must be handled before conversion to GatewayError".into())
            }
        }
    }
}

impl From<PoolError> for GatewayError {
    fn from(value: PoolError) -> Self {
        match value {
            PoolError::UnlistedModel { requested, .. } => GatewayError::UnlistedModel { requested },
            PoolError::UnknownProvider { provider } => GatewayError::UnknownProvider { provider },
            PoolError::UnsupportedFeatures { .. } => GatewayError::UnsupportedFeatures,
        }
    }
}

impl From<gateway_storage::StorageError> for GatewayError {
    fn from(value: gateway_storage::StorageError) -> Self {
        GatewayError::Internal(value.to_string())
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.openai_body().error.message, self.status())
    }
}

impl std::error::Error for GatewayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_errors_map_to_400() {
        let err: GatewayError = HookError::InvisibleText.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.openai_body().error.code.as_deref(), Some("invisible_text"));
    }

    #[test]
    fn unlisted_model_maps_to_404() {
        let err: GatewayError = PoolError::UnlistedModel { requested: "m".into(), known: vec![] }.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let err = GatewayError::RateLimited { retry_after_secs: 1.4 };
        assert_eq!(err.retry_after_secs(), Some(2));
    }
}
