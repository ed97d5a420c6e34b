use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::services::core::client::{CoreClient, CoreError};
use crate::services::core::proto::{ChainConfig, TokenConfig};

/// Per-chain record kept by the cache.
struct ChainEntry {
    config: Option<Arc<ChainConfig>>,
    /// Token address -> token config.
    tokens: HashMap<String, Arc<TokenConfig>>,
    updated_at: DateTime<Utc>,
}

/// Deep copy of one chain's record, safe to hand across API boundaries.
#[derive(Debug, Clone)]
pub struct ChainData {
    pub chain_config: Option<ChainConfig>,
    pub tokens: HashMap<String, TokenConfig>,
    pub updated_at: DateTime<Utc>,
}

struct CacheInner {
    chains: HashMap<String, ChainEntry>,
    last_update: Option<DateTime<Utc>>,
}

/// Thread-safe registry cache keyed by CAIP chain identifier.
///
/// Shared accessors hand out `Arc` clones; [`ConfigCache::get_chain_data`]
/// is the only accessor that deep-copies. A single reader/writer lock guards
/// the whole map.
pub struct ConfigCache {
    inner: RwLock<CacheInner>,
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                chains: HashMap::new(),
                last_update: None,
            }),
        }
    }

    pub async fn get_chain_config(&self, chain: &str) -> Option<Arc<ChainConfig>> {
        let inner = self.inner.read().await;
        inner.chains.get(chain).and_then(|entry| entry.config.clone())
    }

    pub async fn get_all_chain_configs(&self) -> Vec<Arc<ChainConfig>> {
        let inner = self.inner.read().await;
        inner
            .chains
            .values()
            .filter_map(|entry| entry.config.clone())
            .collect()
    }

    pub async fn get_token_config(&self, chain: &str, address: &str) -> Option<Arc<TokenConfig>> {
        let inner = self.inner.read().await;
        inner
            .chains
            .get(chain)
            .and_then(|entry| entry.tokens.get(address).cloned())
    }

    pub async fn get_token_configs_by_chain(&self, chain: &str) -> Vec<Arc<TokenConfig>> {
        let inner = self.inner.read().await;
        inner
            .chains
            .get(chain)
            .map(|entry| entry.tokens.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get_all_token_configs(&self) -> Vec<Arc<TokenConfig>> {
        let inner = self.inner.read().await;
        inner
            .chains
            .values()
            .flat_map(|entry| entry.tokens.values().cloned())
            .collect()
    }

    /// Deep copy of the whole record; callers can mutate it freely without
    /// touching the cache.
    pub async fn get_chain_data(&self, chain: &str) -> Option<ChainData> {
        let inner = self.inner.read().await;
        inner.chains.get(chain).map(|entry| ChainData {
            chain_config: entry.config.as_deref().cloned(),
            tokens: entry
                .tokens
                .iter()
                .map(|(addr, token)| (addr.clone(), (**token).clone()))
                .collect(),
            updated_at: entry.updated_at,
        })
    }

    /// Stamp of the last `update_all`; partial updates do not move it.
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_update
    }

    /// Replace the chain set. Chains whose identifier survives keep their
    /// token submap; dropped identifiers lose theirs.
    pub async fn update_chain_configs(&self, configs: Vec<ChainConfig>) {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut old = std::mem::take(&mut inner.chains);
        for config in configs {
            let tokens = old
                .remove(&config.chain)
                .map(|entry| entry.tokens)
                .unwrap_or_default();
            inner.chains.insert(
                config.chain.clone(),
                ChainEntry {
                    config: Some(Arc::new(config)),
                    tokens,
                    updated_at: now,
                },
            );
        }
    }

    /// Clear every token submap and repopulate. Tokens on chains with no
    /// configuration create a record with a nil chain config.
    pub async fn update_token_configs(&self, tokens: Vec<TokenConfig>) {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        for entry in inner.chains.values_mut() {
            entry.tokens.clear();
            entry.updated_at = now;
        }
        for token in tokens {
            let entry = inner
                .chains
                .entry(token.chain.clone())
                .or_insert_with(|| ChainEntry {
                    config: None,
                    tokens: HashMap::new(),
                    updated_at: now,
                });
            entry.tokens.insert(token.address.clone(), Arc::new(token));
            entry.updated_at = now;
        }
    }

    /// Atomic two-step rebuild of both dimensions; the only operation that
    /// moves the last-update stamp.
    pub async fn update_all(&self, chains: Vec<ChainConfig>, tokens: Vec<TokenConfig>) {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        inner.chains = chains
            .into_iter()
            .map(|config| {
                (
                    config.chain.clone(),
                    ChainEntry {
                        config: Some(Arc::new(config)),
                        tokens: HashMap::new(),
                        updated_at: now,
                    },
                )
            })
            .collect();

        for token in tokens {
            let entry = inner
                .chains
                .entry(token.chain.clone())
                .or_insert_with(|| ChainEntry {
                    config: None,
                    tokens: HashMap::new(),
                    updated_at: now,
                });
            entry.tokens.insert(token.address.clone(), Arc::new(token));
        }

        inner.last_update = Some(now);
    }

    /// Pull both registries from the home chain and swap them in atomically.
    pub async fn refresh_from(&self, client: &CoreClient) -> Result<(), CoreError> {
        let chains = client.all_chain_configs().await?;
        let tokens = client.all_token_configs().await?;
        info!(
            chains = chains.len(),
            tokens = tokens.len(),
            "registry cache refreshed from home chain"
        );
        self.update_all(chains, tokens).await;
        Ok(())
    }
}

/// Keep the cache in sync with the home chain on a fixed interval. The task
/// runs until aborted by the caller.
pub fn spawn_refresher(
    cache: Arc<ConfigCache>,
    client: CoreClient,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = cache.refresh_from(&client).await {
                warn!(error = %e, "registry cache refresh failed");
            }
        }
    })
}
