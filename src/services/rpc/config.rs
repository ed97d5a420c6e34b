use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::services::rpc::selector::LoadBalancingStrategy;

/// Tuning knobs for a single per-chain endpoint pool.
///
/// Missing or non-positive values fall back to the defaults when the config
/// is normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_health_check_interval_s")]
    pub health_check_interval_s: u64,
    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: u64,
    #[serde(default = "default_recovery_interval_s")]
    pub recovery_interval_s: u64,
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u64,
    #[serde(default = "default_min_healthy_endpoints")]
    pub min_healthy_endpoints: usize,
    #[serde(default)]
    pub load_balancing_strategy: LoadBalancingStrategy,
}

fn default_health_check_interval_s() -> u64 {
    30
}

fn default_request_timeout_s() -> u64 {
    10
}

fn default_recovery_interval_s() -> u64 {
    300
}

fn default_unhealthy_threshold() -> u64 {
    3
}

fn default_min_healthy_endpoints() -> usize {
    1
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            health_check_interval_s: default_health_check_interval_s(),
            request_timeout_s: default_request_timeout_s(),
            recovery_interval_s: default_recovery_interval_s(),
            unhealthy_threshold: default_unhealthy_threshold(),
            min_healthy_endpoints: default_min_healthy_endpoints(),
            load_balancing_strategy: LoadBalancingStrategy::default(),
        }
    }
}

impl PoolConfig {
    /// Replace zero values with the documented defaults.
    pub fn normalized(mut self) -> Self {
        if self.health_check_interval_s == 0 {
            self.health_check_interval_s = default_health_check_interval_s();
        }
        if self.request_timeout_s == 0 {
            self.request_timeout_s = default_request_timeout_s();
        }
        if self.recovery_interval_s == 0 {
            self.recovery_interval_s = default_recovery_interval_s();
        }
        if self.unhealthy_threshold == 0 {
            self.unhealthy_threshold = default_unhealthy_threshold();
        }
        if self.min_healthy_endpoints == 0 {
            self.min_healthy_endpoints = default_min_healthy_endpoints();
        }
        self
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_s)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_s)
    }
}

/// Endpoint list plus pool tuning for one external chain, as found in the
/// pool configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainPoolConfig {
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub pool: PoolConfig,
}

/// Load per-chain pool configuration from a JSON file, substituting
/// `${VAR_NAME}` references with environment variable values first.
pub fn load_pool_configs(path: &str) -> Result<HashMap<String, ChainPoolConfig>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    let content = expand_env_refs(&content);

    let configs: HashMap<String, ChainPoolConfig> =
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    for (chain, config) in &configs {
        validate_urls(chain, &config.urls)?;
    }

    Ok(configs
        .into_iter()
        .map(|(chain, mut config)| {
            config.pool = config.pool.normalized();
            (chain, config)
        })
        .collect())
}

fn validate_urls(chain: &str, urls: &[String]) -> Result<(), ConfigError> {
    if urls.is_empty() {
        return Err(ConfigError::Validation(format!(
            "no RPC URLs configured for chain {chain}"
        )));
    }
    let mut seen = HashSet::new();
    for url in urls {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "invalid RPC URL for chain {chain}: {url}"
            )));
        }
        if !seen.insert(url) {
            return Err(ConfigError::Validation(format!(
                "duplicate RPC URL for chain {chain}: {url}"
            )));
        }
    }
    Ok(())
}

/// Expand `${VAR_NAME}` references against the process environment in a
/// single pass. References to unset variables are left in place.
fn expand_env_refs(content: &str) -> String {
    let pattern = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    pattern
        .replace_all(content, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
