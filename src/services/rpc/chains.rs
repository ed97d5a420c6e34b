//! Default pool clients for the supported external chain families.
//!
//! Observers and dispatchers may plug their own factories into the pool;
//! these adapters cover the common case of public JSON-RPC endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_sdk::commitment_config::CommitmentConfig;

use crate::services::rpc::config::PoolConfig;
use crate::services::rpc::pool::{
    ClientFactory, EndpointStatus, HealthChecker, PoolError, RpcPool,
};

/// CAIP namespaces with a bundled adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedNamespace {
    Eip155,
    Solana,
}

impl SupportedNamespace {
    /// Map a CAIP identifier (`namespace:reference`) to its adapter family.
    pub fn from_chain_id(chain: &str) -> Option<Self> {
        match chain.split(':').next() {
            Some("eip155") => Some(Self::Eip155),
            Some("solana") => Some(Self::Solana),
            _ => None,
        }
    }
}

/// Factory + checker pair resolved for one adapter family.
pub enum ChainAdapter {
    Evm {
        factory: Arc<dyn ClientFactory<EvmRpcClient>>,
        checker: Arc<dyn HealthChecker<EvmRpcClient>>,
    },
    Svm {
        factory: Arc<dyn ClientFactory<SolanaRpcClient>>,
        checker: Arc<dyn HealthChecker<SolanaRpcClient>>,
    },
}

/// Resolve the bundled factory + checker pair for a CAIP identifier.
///
/// `None` for namespaces without a bundled adapter; callers with their own
/// clients plug into [`RpcPool::new`] directly.
pub fn client_factory_for(chain: &str, request_timeout: Duration) -> Option<ChainAdapter> {
    match SupportedNamespace::from_chain_id(chain)? {
        SupportedNamespace::Eip155 => Some(ChainAdapter::Evm {
            factory: Arc::new(EvmClientFactory::new(request_timeout)),
            checker: Arc::new(EvmHealthChecker),
        }),
        SupportedNamespace::Solana => Some(ChainAdapter::Svm {
            factory: Arc::new(SvmClientFactory),
            checker: Arc::new(SvmHealthChecker),
        }),
    }
}

impl ChainAdapter {
    /// Assemble the endpoint pool for this adapter family.
    pub fn build_pool(
        self,
        chain: impl Into<String>,
        urls: &[String],
        config: PoolConfig,
    ) -> ChainPool {
        match self {
            ChainAdapter::Evm { factory, checker } => {
                ChainPool::Evm(RpcPool::new(chain, urls, config, factory, Some(checker)))
            }
            ChainAdapter::Svm { factory, checker } => {
                ChainPool::Svm(RpcPool::new(chain, urls, config, factory, Some(checker)))
            }
        }
    }
}

/// Pool handle erased over the adapter family. Lifecycle and introspection
/// are uniform; family-specific selection goes through [`ChainPool::as_evm`]
/// or [`ChainPool::as_svm`].
pub enum ChainPool {
    Evm(Arc<RpcPool<EvmRpcClient>>),
    Svm(Arc<RpcPool<SolanaRpcClient>>),
}

impl ChainPool {
    pub async fn start(&self) -> Result<(), PoolError> {
        match self {
            ChainPool::Evm(pool) => pool.start().await,
            ChainPool::Svm(pool) => pool.start().await,
        }
    }

    pub async fn stop(&self) {
        match self {
            ChainPool::Evm(pool) => pool.stop().await,
            ChainPool::Svm(pool) => pool.stop().await,
        }
    }

    pub fn chain(&self) -> &str {
        match self {
            ChainPool::Evm(pool) => pool.chain(),
            ChainPool::Svm(pool) => pool.chain(),
        }
    }

    pub fn health_status(&self) -> Vec<EndpointStatus> {
        match self {
            ChainPool::Evm(pool) => pool.health_status(),
            ChainPool::Svm(pool) => pool.health_status(),
        }
    }

    pub fn as_evm(&self) -> Option<&Arc<RpcPool<EvmRpcClient>>> {
        match self {
            ChainPool::Evm(pool) => Some(pool),
            ChainPool::Svm(_) => None,
        }
    }

    pub fn as_svm(&self) -> Option<&Arc<RpcPool<SolanaRpcClient>>> {
        match self {
            ChainPool::Svm(pool) => Some(pool),
            ChainPool::Evm(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<ChainClientError> for PoolError {
    fn from(e: ChainClientError) -> Self {
        PoolError::Rpc(e.to_string())
    }
}

/// JSON-RPC 2.0 client for EVM-family endpoints.
pub struct EvmRpcClient {
    client: reqwest::Client,
    url: String,
}

impl EvmRpcClient {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call_rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainClientError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChainClientError::Network(e.to_string()))?;

        let rpc_response: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainClientError::Parse(e.to_string()))?;

        if let Some(err) = rpc_response.error {
            return Err(ChainClientError::Rpc(err.message));
        }

        rpc_response
            .result
            .ok_or_else(|| ChainClientError::Parse("missing result".to_string()))
    }

    pub async fn block_number(&self) -> Result<u64, ChainClientError> {
        let hex: String = self.call_rpc("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&hex)
    }

    pub async fn chain_id(&self) -> Result<u64, ChainClientError> {
        let hex: String = self.call_rpc("eth_chainId", json!([])).await?;
        parse_hex_u64(&hex)
    }

    pub async fn gas_price(&self) -> Result<u128, ChainClientError> {
        let hex: String = self.call_rpc("eth_gasPrice", json!([])).await?;
        u128::from_str_radix(hex.trim_start_matches("0x"), 16)
            .map_err(|e| ChainClientError::Parse(format!("invalid gas price hex: {e}")))
    }
}

fn parse_hex_u64(hex: &str) -> Result<u64, ChainClientError> {
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| ChainClientError::Parse(format!("invalid hex quantity: {e}")))
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObj>,
}

#[derive(Deserialize)]
struct RpcErrorObj {
    message: String,
}

pub struct EvmClientFactory {
    timeout: Duration,
}

impl EvmClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ClientFactory<EvmRpcClient> for EvmClientFactory {
    async fn create(&self, url: &str) -> Result<EvmRpcClient, PoolError> {
        Ok(EvmRpcClient::new(url.to_string(), self.timeout))
    }
}

/// Healthy when the node answers `eth_blockNumber` with a parseable quantity.
pub struct EvmHealthChecker;

#[async_trait]
impl HealthChecker<EvmRpcClient> for EvmHealthChecker {
    async fn check_health(&self, client: &EvmRpcClient) -> Result<(), PoolError> {
        client
            .block_number()
            .await
            .map(|_| ())
            .map_err(|e| PoolError::HealthCheck(e.to_string()))
    }
}

pub struct SvmClientFactory;

#[async_trait]
impl ClientFactory<SolanaRpcClient> for SvmClientFactory {
    async fn create(&self, url: &str) -> Result<SolanaRpcClient, PoolError> {
        Ok(SolanaRpcClient::new(url.to_string()))
    }
}

/// Healthy when the node answers both `getVersion` and `getSlot`; version
/// alone can succeed on a node that has stopped making progress.
pub struct SvmHealthChecker;

#[async_trait]
impl HealthChecker<SolanaRpcClient> for SvmHealthChecker {
    async fn check_health(&self, client: &SolanaRpcClient) -> Result<(), PoolError> {
        client
            .get_version()
            .await
            .map_err(|e| PoolError::HealthCheck(format!("getVersion: {e}")))?;
        client
            .get_slot_with_commitment(CommitmentConfig::confirmed())
            .await
            .map_err(|e| PoolError::HealthCheck(format!("getSlot: {e}")))?;
        Ok(())
    }
}
