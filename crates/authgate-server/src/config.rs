//! Server configuration loading.
//!
//! Layered sources: an optional TOML file (`authgate.toml` by default),
//! then environment overrides such as `AUTHGATE__SERVER__PORT=9090`.

use std::path::PathBuf;

use authgate_auth::config::GatewayConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Full server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listener settings.
    pub server: ServerConfig,
    /// Gateway workflow settings.
    pub gateway: GatewayConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Log level applied after startup, unless `RUST_LOG` overrides it.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            log_level: "info".to_string(),
        }
    }
}

/// Loads and validates the configuration.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
    let mut builder = Config::builder();
    let file = PathBuf::from(path.unwrap_or("authgate.toml"));
    if file.exists() {
        builder = builder.add_source(File::from(file));
    }
    builder = builder.add_source(
        Environment::with_prefix("AUTHGATE")
            .try_parsing(true)
            .separator("__"),
    );

    let cfg = builder
        .build()
        .map_err(|e| format!("config build error: {e}"))?;
    let merged: AppConfig = cfg
        .try_deserialize()
        .map_err(|e| format!("config deserialize error: {e}"))?;
    merged.gateway.validate().map_err(|e| e.to_string())?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.log_level, "info");
    }

    #[test]
    fn test_missing_client_fails_validation() {
        // No file, no env overrides: the default gateway section has no
        // client credentials and must be refused.
        let err = load_config(Some("does-not-exist.toml")).unwrap_err();
        assert!(err.contains("client_id"));
    }
}
