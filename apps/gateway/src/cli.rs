use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "gateway", version, about = "Policy-enforcing, cost-accounting, multi-provider LLM gateway")]
pub struct Cli {
    /// Database DSN, e.g. `sqlite:///var/lib/gateway/gateway.db` or a Postgres URL.
    #[arg(long, env = "GATEWAY_DSN", default_value = "sqlite::memory:")]
    pub dsn: String,

    /// Directory for the local sled-backed budget cache.
    #[arg(long, env = "GATEWAY_DATA_DIR", default_value = "./data/budget-cache")]
    pub data_dir: String,

    /// Bind host.
    #[arg(long, env = "GATEWAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port.
    #[arg(long, env = "GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,
}
