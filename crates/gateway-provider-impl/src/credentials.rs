use gateway_provider_core::ProviderError;
use serde::Deserialize;

/// Parsed shape of `providers.credentials`; each concrete client reads
/// only the fields its kind needs and reports
/// `ProviderError::InvalidConfig` via `MissingCredentialField` semantics
/// for anything missing.
#[derive(Debug, Clone, Deserialize)]
pub struct RestCredentials {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub deployment: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
}

impl RestCredentials {
    pub fn parse(raw: &serde_json::Value) -> Result<Self, ProviderError> {
        serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::new(format!("invalid credentials: {e}"), 500, "internal_error"))
    }

    pub fn require_api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::new("missing credential field: api_key", 500, "internal_error"))
    }

    pub fn require_base_url(&self) -> Result<&str, ProviderError> {
        self.base_url
            .as_deref()
            .ok_or_else(|| ProviderError::new("missing credential field: base_url", 500, "internal_error"))
    }
}
