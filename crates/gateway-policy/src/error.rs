use serde_json::Value as JsonValue;
use thiserror::Error;

/// A hook may short-circuit the pipeline or reject the request outright.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("instant api response")]
    InstantApiResponse(JsonValue),
    #[error("prompt injection detected")]
    PromptInjection,
    #[error("message language is not allowed")]
    UnallowedLanguage,
    #[error("invisible text detected")]
    InvisibleText,
    #[error("forbidden topic: {0}")]
    ForbiddenTopic(String),
    #[error("policy is not ready: {0}")]
    PolicyIsNotReady(String),
}
