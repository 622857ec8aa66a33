use thiserror::Error;

/// Normalized shape of an upstream failure, ready to be projected into
/// an OpenAI-compatible error body by `gateway-core`.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub message: String,
    pub http_code: u16,
    pub openai_type: String,
    pub openai_code: Option<String>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>, http_code: u16, openai_type: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_code,
            openai_type: openai_type.into(),
            openai_code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.openai_code = Some(code.into());
        self
    }

    pub fn unsupported(feature: &str) -> Self {
        Self::new(format!("unsupported feature: {feature}"), 400, "invalid_request_error")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, 500, "internal_error")
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.http_code)
    }
}

impl std::error::Error for ProviderError {}

#[derive(Debug, Error)]
#[error("provider is not ready: {reason}")]
pub struct ProviderIsNotReadyError {
    pub reason: String,
}

#[derive(Debug, Error)]
#[error("resource is not ready: {resource}")]
pub struct ResourceIsNotReadyError {
    pub resource: String,
}

#[derive(Debug, Error)]
pub enum GatewayProviderError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    NotReady(#[from] ProviderIsNotReadyError),
    #[error(transparent)]
    ResourceNotReady(#[from] ResourceIsNotReadyError),
}

impl GatewayProviderError {
    pub fn http_code(&self) -> u16 {
        match self {
            GatewayProviderError::Provider(e) => e.http_code,
            GatewayProviderError::NotReady(_) => 503,
            GatewayProviderError::ResourceNotReady(_) => 503,
        }
    }
}
