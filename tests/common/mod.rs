use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;

use universal_client::services::core::proto::{ChainConfig, TokenConfig};
use universal_client::services::rpc::{
    ClientFactory, HealthChecker, LoadBalancingStrategy, PoolConfig, PoolError,
};

static TRACING: Once = Once::new();

/// Opt-in test logging via RUST_LOG.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct MockChainClient {
    pub url: String,
}

/// Factory that fails client construction for a chosen set of URLs.
#[allow(dead_code)]
pub struct MockFactory {
    fail: HashSet<String>,
}

#[allow(dead_code)]
impl MockFactory {
    pub fn new() -> Self {
        Self {
            fail: HashSet::new(),
        }
    }

    pub fn failing(urls: &[&str]) -> Self {
        Self {
            fail: urls.iter().map(|u| u.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ClientFactory<MockChainClient> for MockFactory {
    async fn create(&self, url: &str) -> Result<MockChainClient, PoolError> {
        if self.fail.contains(url) {
            return Err(PoolError::ClientConstruction {
                url: url.to_string(),
                message: "mock construction failure".to_string(),
            });
        }
        Ok(MockChainClient {
            url: url.to_string(),
        })
    }
}

/// Health checker whose verdict is flipped by the test through a shared flag.
#[allow(dead_code)]
pub struct FlagChecker {
    healthy: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FlagChecker {
    pub fn new(healthy: Arc<AtomicBool>) -> Self {
        Self { healthy }
    }

    pub fn always_healthy() -> Self {
        Self {
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait]
impl HealthChecker<MockChainClient> for FlagChecker {
    async fn check_health(&self, _client: &MockChainClient) -> Result<(), PoolError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PoolError::HealthCheck("probe failed".to_string()))
        }
    }
}

#[allow(dead_code)]
pub fn pool_config(strategy: LoadBalancingStrategy) -> PoolConfig {
    PoolConfig {
        health_check_interval_s: 1,
        request_timeout_s: 1,
        recovery_interval_s: 5,
        unhealthy_threshold: 3,
        min_healthy_endpoints: 1,
        load_balancing_strategy: strategy,
    }
}

#[allow(dead_code)]
pub fn chain_config(id: &str) -> ChainConfig {
    ChainConfig {
        chain: id.to_string(),
        public_rpc_url: format!("https://rpc.{}.example.com", id.replace(':', "-")),
        gateway_address: "0x00000000000000000000000000000000000000aa".to_string(),
        block_confirmations: 12,
        gas_limit: 21_000,
        vm_type: 1,
        enabled: true,
    }
}

#[allow(dead_code)]
pub fn token_config(chain: &str, address: &str, symbol: &str) -> TokenConfig {
    TokenConfig {
        chain: chain.to_string(),
        address: address.to_string(),
        name: format!("{symbol} Token"),
        symbol: symbol.to_string(),
        decimals: 18,
        enabled: true,
        native: false,
        liquidity_cap: "1000000".to_string(),
    }
}
