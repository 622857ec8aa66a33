use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged global configuration used by the running process.
///
/// Merge order: CLI > ENV > config file > default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Sqlite/postgres DSN for the document store.
    pub dsn: String,
    /// Path to the embedded budget-cache / queue-store sled database.
    pub kv_path: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_from: Option<String>,
    /// Days of usage-record retention before eligible for pruning.
    pub retention_days: u32,
    /// Free RAM threshold (MB) below which resource-heavy hooks report `ResourceIsNotReadyError`.
    pub check_free_ram_mb: Option<u64>,
    /// Whether successful responses carry `{remaining, spent}` budget info.
    pub response_with_spend: bool,
}

/// Optional layer used while merging global config from env/file/CLI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dsn: Option<String>,
    pub kv_path: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_from: Option<String>,
    pub retention_days: Option<u32>,
    pub check_free_ram_mb: Option<u64>,
    pub response_with_spend: Option<bool>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.dsn.is_some() {
            self.dsn = other.dsn;
        }
        if other.kv_path.is_some() {
            self.kv_path = other.kv_path;
        }
        if other.smtp_host.is_some() {
            self.smtp_host = other.smtp_host;
        }
        if other.smtp_port.is_some() {
            self.smtp_port = other.smtp_port;
        }
        if other.smtp_from.is_some() {
            self.smtp_from = other.smtp_from;
        }
        if other.retention_days.is_some() {
            self.retention_days = other.retention_days;
        }
        if other.check_free_ram_mb.is_some() {
            self.check_free_ram_mb = other.check_free_ram_mb;
        }
        if other.response_with_spend.is_some() {
            self.response_with_spend = other.response_with_spend;
        }
    }

    /// Reads the gateway's recognized env vars and overlays them on top.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("GATEWAY_HOST").ok(),
            port: std::env::var("GATEWAY_PORT").ok().and_then(|v| v.parse().ok()),
            dsn: std::env::var("GATEWAY_DSN").ok(),
            kv_path: std::env::var("GATEWAY_KV_PATH").ok(),
            smtp_host: std::env::var("SMTP_HOST").ok(),
            smtp_port: std::env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_from: std::env::var("SMTP_FROM").ok(),
            retention_days: std::env::var("RETENTION_DAYS").ok().and_then(|v| v.parse().ok()),
            check_free_ram_mb: std::env::var("CHECK_FREE_RAM").ok().and_then(|v| v.parse().ok()),
            response_with_spend: std::env::var("RESPONSE_WITH_SPEND")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8080),
            dsn: self.dsn.ok_or(GlobalConfigError::MissingField("dsn"))?,
            kv_path: self.kv_path.unwrap_or_else(|| "./data/gateway-kv".to_string()),
            smtp_host: self.smtp_host,
            smtp_port: self.smtp_port,
            smtp_from: self.smtp_from,
            retention_days: self.retention_days.unwrap_or(90),
            check_free_ram_mb: self.check_free_ram_mb,
            response_with_spend: self.response_with_spend.unwrap_or(true),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            dsn: Some(value.dsn),
            kv_path: Some(value.kv_path),
            smtp_host: value.smtp_host,
            smtp_port: value.smtp_port,
            smtp_from: value.smtp_from,
            retention_days: Some(value.retention_days),
            check_free_ram_mb: value.check_free_ram_mb,
            response_with_spend: Some(value.response_with_spend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_overlay_prefers_later_values() {
        let mut base = GlobalConfigPatch {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            ..Default::default()
        };
        base.overlay(GlobalConfigPatch {
            port: Some(9090),
            ..Default::default()
        });
        assert_eq!(base.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(base.port, Some(9090));
    }

    #[test]
    fn into_config_requires_dsn() {
        let patch = GlobalConfigPatch::default();
        assert!(matches!(
            patch.into_config(),
            Err(GlobalConfigError::MissingField("dsn"))
        ));
    }
}
