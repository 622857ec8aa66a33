use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::HeaderMap;
use time::OffsetDateTime;

use gateway_config::ConfigStore;
use gateway_storage::entities::api_keys;
use gateway_storage::Storage;

use crate::error::GatewayError;

/// Blake3 digest of the opaque bearer token, hex-encoded — matches the
/// hash stored in `api_keys.key_hash`.
pub fn hash_api_key(raw: &str) -> String {
    blake3::hash(raw.as_bytes()).to_hex().to_string()
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))
}

fn seconds_in_period(period: &str) -> f64 {
    match period {
        "second" => 1.0,
        "minute" => 60.0,
        "hour" => 3600.0,
        _ => 1.0,
    }
}

/// Process-local minimum-inter-request-interval limiter (spec's Open
/// Question 1 accepts a per-process bound rather than a shared store).
#[derive(Default)]
pub struct RateLimiter {
    last_admitted: DashMap<i64, Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` requests per `period` translate to a minimum interval
    /// `r = seconds_in_period(period) / count`. Rejects with the
    /// remaining wait if less than `r` has elapsed since the last
    /// admitted request for this key; otherwise admits and remembers
    /// this instant.
    pub fn check(&self, key_id: i64, count: i32, period: &str) -> Result<(), f64> {
        if count <= 0 {
            return Ok(());
        }
        let interval = Duration::from_secs_f64(seconds_in_period(period) / count as f64);
        let now = Instant::now();
        match self.last_admitted.get(&key_id) {
            Some(last) => {
                let elapsed = now.duration_since(*last);
                if elapsed < interval {
                    return Err((interval - elapsed).as_secs_f64());
                }
            }
            None => {}
        }
        self.last_admitted.insert(key_id, now);
        Ok(())
    }
}

/// Resolves a `Bearer` token to its API key document, applying the
/// expiry, budget-suspension, and rate-limit checks in order.
pub struct AuthGate<S: Storage> {
    config: Arc<ConfigStore<S>>,
    limiter: Arc<RateLimiter>,
}

impl<S: Storage> AuthGate<S> {
    pub fn new(config: Arc<ConfigStore<S>>, limiter: Arc<RateLimiter>) -> Self {
        Self { config, limiter }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<api_keys::Model, GatewayError> {
        let token = extract_bearer(headers).ok_or(GatewayError::MissingAuth)?;
        let hash = hash_api_key(token);
        let key = self.config.find_key_by_hash(&hash).await?.ok_or(GatewayError::InvalidAuth)?;

        let now = OffsetDateTime::now_utc();
        if let Some(expires_at) = key.expires_at {
            if expires_at <= now {
                return Err(GatewayError::ExpiredKey);
            }
        }
        if let Some(unbudgeted_until) = key.unbudgeted_until {
            if unbudgeted_until > now {
                let delta_secs = (unbudgeted_until - now).as_seconds_f64();
                return Err(GatewayError::BudgetSuspended { delta_secs });
            }
        }
        if let Some(count) = key.rate_limit_count {
            let period = key.rate_limit_period.as_deref().unwrap_or("second");
            if let Err(retry_after_secs) = self.limiter.check(key.id, count, period) {
                return Err(GatewayError::RateLimited { retry_after_secs });
            }
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_api_key("sk-abc"), hash_api_key("sk-abc"));
        assert_ne!(hash_api_key("sk-abc"), hash_api_key("sk-def"));
    }

    #[test]
    fn second_request_within_interval_is_rejected() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(1, 1, "second").is_ok());
        assert!(limiter.check(1, 1, "second").is_err());
    }

    #[test]
    fn different_keys_do_not_interfere() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(1, 1, "second").is_ok());
        assert!(limiter.check(2, 1, "second").is_ok());
    }

    #[test]
    fn zero_count_never_limits() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(5, 0, "second").is_ok());
        assert!(limiter.check(5, 0, "second").is_ok());
    }

    #[test]
    fn extracts_bearer_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "bearer sk-xyz".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Some("sk-xyz"));
    }
}
