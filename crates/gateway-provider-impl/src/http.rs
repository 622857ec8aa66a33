use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use gateway_provider_core::ProviderError;

/// One shared `wreq::Client` per distinct outbound proxy, matching the
/// teacher's provider http client cache — building a TLS client per
/// request is wasteful, and the client is immutable once built.
static CLIENT_CACHE: OnceLock<Mutex<HashMap<Option<String>, wreq::Client>>> = OnceLock::new();

pub fn shared_client(proxy: Option<&str>) -> Result<wreq::Client, ProviderError> {
    let key = proxy.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    let cache = CLIENT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache
        .lock()
        .map_err(|_| ProviderError::internal("http client cache lock poisoned"))?;

    if let Some(client) = guard.get(&key) {
        return Ok(client.clone());
    }

    let mut builder = wreq::Client::builder();
    if let Some(proxy_url) = key.as_deref() {
        builder = builder
            .proxy(wreq::Proxy::all(proxy_url).map_err(|e| ProviderError::internal(e.to_string()))?);
    }
    let client = builder.build().map_err(|e| ProviderError::internal(e.to_string()))?;
    guard.insert(key, client.clone());
    Ok(client)
}
