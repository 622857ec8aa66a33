use std::sync::Arc;

use gateway_core::{AuthGate, GatewayDeps, RateLimiter};
use gateway_storage::SeaOrmStorage;

/// Everything an axum handler needs: the request-building `GatewayDeps`
/// plus the auth gate that turns a bearer token into an `api_keys` row.
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<GatewayDeps<SeaOrmStorage>>,
    pub auth: Arc<AuthGate<SeaOrmStorage>>,
}

impl AppState {
    pub fn new(deps: Arc<GatewayDeps<SeaOrmStorage>>, limiter: Arc<RateLimiter>) -> Self {
        let auth = Arc::new(AuthGate::new(deps.config.clone(), limiter));
        Self { deps, auth }
    }
}
