use std::env;

use thiserror::Error;

use crate::services::keyring::{KeyringBackend, KeyringConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {message}")]
    InvalidVar { var: &'static str, message: String },
    #[error("failed to read config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("validation error: {0}")]
    Validation(String),
}

/// Process configuration loaded from environment variables.
#[derive(Debug)]
pub struct Config {
    /// Home-chain gRPC endpoints, in preference order.
    pub core_grpc_urls: Vec<String>,
    pub keyring: KeyringConfig,
    /// Optional path to the per-chain RPC pool configuration file.
    pub pool_config_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let urls = env::var("UC_CORE_GRPC_URLS")
            .map_err(|_| ConfigError::MissingVar("UC_CORE_GRPC_URLS"))?;
        let core_grpc_urls: Vec<String> = urls
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if core_grpc_urls.is_empty() {
            return Err(ConfigError::InvalidVar {
                var: "UC_CORE_GRPC_URLS",
                message: "no gRPC URLs provided".to_string(),
            });
        }

        let backend = env::var("UC_KEYRING_BACKEND").unwrap_or_else(|_| "test".to_string());
        let backend: KeyringBackend =
            backend.parse().map_err(|message| ConfigError::InvalidVar {
                var: "UC_KEYRING_BACKEND",
                message,
            })?;

        let keyring = KeyringConfig {
            home_dir: env::var("UC_KEYRING_DIR")
                .map_err(|_| ConfigError::MissingVar("UC_KEYRING_DIR"))?
                .into(),
            backend,
            hotkey_name: env::var("UC_HOTKEY_NAME")
                .map_err(|_| ConfigError::MissingVar("UC_HOTKEY_NAME"))?,
            hotkey_password: env::var("UC_HOTKEY_PASSWORD").ok(),
            operator_address: env::var("UC_OPERATOR_ADDRESS")
                .map_err(|_| ConfigError::MissingVar("UC_OPERATOR_ADDRESS"))?,
        };

        if keyring.hotkey_name.is_empty() {
            return Err(ConfigError::InvalidVar {
                var: "UC_HOTKEY_NAME",
                message: "key name cannot be empty".to_string(),
            });
        }

        Ok(Self {
            core_grpc_urls,
            keyring,
            pool_config_path: env::var("UC_POOL_CONFIG").ok(),
        })
    }
}
