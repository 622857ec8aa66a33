mod cli;
mod error_response;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;

use gateway_background::{BackgroundLoops, Mailer, TracingMailer};
use gateway_config::ConfigStore;
use gateway_core::{BudgetCache, GatewayDeps, RateLimiter};
use gateway_provider_core::ProviderRegistry;
use gateway_provider_impl::build_provider;
use gateway_storage::SeaOrmStorage;

use crate::cli::Cli;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let storage = Arc::new(SeaOrmStorage::connect(&cli.dsn).await?);
    storage.sync().await?;

    let config = Arc::new(ConfigStore::new(storage.clone()));
    let registry = Arc::new(ProviderRegistry::new(storage.clone(), build_provider));
    let budget = Arc::new(BudgetCache::open(&cli.data_dir)?);

    let deps = Arc::new(GatewayDeps { storage: storage.clone(), config, registry, budget: budget.clone() });
    let limiter = Arc::new(RateLimiter::new());
    let state = AppState::new(deps, limiter);

    let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer);
    let _background = BackgroundLoops::spawn(storage.clone(), budget.clone(), mailer);

    let app = http::router(state);
    let bind = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
