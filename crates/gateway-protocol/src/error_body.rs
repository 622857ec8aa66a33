use serde::{Deserialize, Serialize};

/// `{"error": {"message", "type", "code", "param"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub code: Option<String>,
    pub param: Option<String>,
}

pub const ORDINARY_PREFIX: &str = "TC_ERROR:";
pub const PROVIDER_PREFIX: &str = "TC_PROVIDER_ERROR:";

impl ErrorBody {
    pub fn ordinary(message: impl Into<String>, kind: impl Into<String>, code: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: format!("{ORDINARY_PREFIX}{}", message.into()),
                kind: kind.into(),
                code,
                param: None,
            },
        }
    }

    pub fn provider(message: impl Into<String>, kind: impl Into<String>, code: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: format!("{PROVIDER_PREFIX}{}", message.into()),
                kind: kind.into(),
                code,
                param: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_prefixes_message() {
        let body = ErrorBody::ordinary("boom", "invalid_request_error", None);
        assert!(body.error.message.starts_with(ORDINARY_PREFIX));
    }

    #[test]
    fn provider_prefixes_message() {
        let body = ErrorBody::provider("boom", "server_error", Some("rate_limited".to_string()));
        assert!(body.error.message.starts_with(PROVIDER_PREFIX));
        assert_eq!(body.error.code.as_deref(), Some("rate_limited"));
    }
}
