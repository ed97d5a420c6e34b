use std::sync::Arc;

use chrono::Utc;
use universal_client::services::registry::ConfigCache;

use crate::common::{chain_config, token_config};

// =============================================================================
// INTEGRATION TESTS - CONFIG CACHE
// =============================================================================

#[tokio::test]
async fn test_update_all_then_lookup() {
    let cache = ConfigCache::new();
    let started = Utc::now();

    cache
        .update_all(
            vec![chain_config("eip155:1"), chain_config("solana:mainnet")],
            vec![
                token_config("eip155:1", "0xaa", "USDC"),
                token_config("eip155:1", "0xbb", "WETH"),
                token_config("solana:mainnet", "So1111", "WSOL"),
            ],
        )
        .await;

    // Every (chain, address) pair resolves to the latest token with that key
    assert_eq!(
        cache
            .get_token_config("eip155:1", "0xaa")
            .await
            .unwrap()
            .symbol,
        "USDC"
    );
    assert_eq!(
        cache
            .get_token_config("solana:mainnet", "So1111")
            .await
            .unwrap()
            .symbol,
        "WSOL"
    );
    assert_eq!(cache.get_all_chain_configs().await.len(), 2);
    assert_eq!(cache.get_all_token_configs().await.len(), 3);
    assert!(cache.last_update().await.unwrap() >= started);
}

#[tokio::test]
async fn test_chain_replacement_preserves_surviving_token_submaps() {
    let cache = ConfigCache::new();

    // Seed with chains X, Y and three tokens (two on X, one on Y)
    cache
        .update_all(
            vec![chain_config("eip155:1"), chain_config("eip155:137")],
            vec![
                token_config("eip155:1", "0xaa", "USDC"),
                token_config("eip155:1", "0xbb", "WETH"),
                token_config("eip155:137", "0xcc", "WMATIC"),
            ],
        )
        .await;

    // Replace with [X, Z]
    cache
        .update_chain_configs(vec![chain_config("eip155:1"), chain_config("eip155:10")])
        .await;

    let x_tokens = cache.get_token_configs_by_chain("eip155:1").await;
    assert_eq!(x_tokens.len(), 2, "X keeps its two tokens");
    assert!(cache.get_token_configs_by_chain("eip155:137").await.is_empty());
    assert!(cache.get_chain_config("eip155:10").await.is_some());
    assert!(cache.get_chain_config("eip155:137").await.is_none());
}

#[tokio::test]
async fn test_token_replacement_drops_everything_not_in_new_set() {
    let cache = ConfigCache::new();
    cache
        .update_all(
            vec![chain_config("eip155:1")],
            vec![
                token_config("eip155:1", "0xaa", "USDC"),
                token_config("eip155:1", "0xbb", "WETH"),
            ],
        )
        .await;

    cache
        .update_token_configs(vec![token_config("eip155:1", "0xdd", "DAI")])
        .await;

    assert!(cache.get_token_config("eip155:1", "0xaa").await.is_none());
    assert!(cache.get_token_config("eip155:1", "0xbb").await.is_none());
    assert!(cache.get_token_config("eip155:1", "0xdd").await.is_some());
    assert_eq!(cache.get_all_token_configs().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_readers_and_writers() {
    let cache = Arc::new(ConfigCache::new());

    let mut handles = Vec::new();
    for round in 0..8u32 {
        let writer = cache.clone();
        handles.push(tokio::spawn(async move {
            writer
                .update_all(
                    vec![chain_config("eip155:1")],
                    vec![token_config("eip155:1", "0xaa", &format!("T{round}"))],
                )
                .await;
        }));
        let reader = cache.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                let _ = reader.get_chain_data("eip155:1").await;
                let _ = reader.get_token_config("eip155:1", "0xaa").await;
            }
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }

    // Whatever writer won, the cache is internally consistent
    let data = cache.get_chain_data("eip155:1").await.unwrap();
    assert!(data.chain_config.is_some());
    assert_eq!(data.tokens.len(), 1);
    assert!(cache.last_update().await.is_some());
}
