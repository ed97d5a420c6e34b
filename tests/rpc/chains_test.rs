use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use universal_client::services::rpc::chains::{
    client_factory_for, ChainAdapter, EvmHealthChecker, EvmRpcClient, SupportedNamespace,
};
use universal_client::services::rpc::{HealthChecker, PoolConfig};

// =============================================================================
// INTEGRATION TESTS - CHAIN ADAPTERS
// =============================================================================

/// Serve one canned HTTP response on a local socket and return its base URL.
async fn canned_http_response(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            // Drain the request headers and body before answering
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_evm_block_number_parses_hex_quantity() {
    let url = canned_http_response(r#"{"jsonrpc":"2.0","id":1,"result":"0x10d4f"}"#).await;
    let client = EvmRpcClient::new(url, Duration::from_secs(2));

    let height = client.block_number().await.unwrap();
    assert_eq!(height, 0x10d4f);
}

#[tokio::test]
async fn test_evm_checker_rejects_malformed_reply() {
    let url = canned_http_response("definitely not json").await;
    let client = EvmRpcClient::new(url, Duration::from_secs(2));

    let err = EvmHealthChecker.check_health(&client).await.unwrap_err();
    assert!(err.to_string().contains("parse error"), "got: {err}");
}

#[tokio::test]
async fn test_evm_checker_surfaces_rpc_error_object() {
    let url = canned_http_response(
        r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#,
    )
    .await;
    let client = EvmRpcClient::new(url, Duration::from_secs(2));

    let err = EvmHealthChecker.check_health(&client).await.unwrap_err();
    assert!(err.to_string().contains("method not found"));
}

#[tokio::test]
async fn test_evm_checker_fails_on_unreachable_endpoint() {
    let client = EvmRpcClient::new(
        "http://127.0.0.1:1".to_string(),
        Duration::from_millis(500),
    );
    assert!(EvmHealthChecker.check_health(&client).await.is_err());
}

#[test]
fn test_client_factory_for_maps_namespaces() {
    assert!(matches!(
        client_factory_for("eip155:11155111", Duration::from_secs(2)),
        Some(ChainAdapter::Evm { .. })
    ));
    assert!(matches!(
        client_factory_for("solana:mainnet", Duration::from_secs(2)),
        Some(ChainAdapter::Svm { .. })
    ));
    assert!(client_factory_for("cosmos:cosmoshub-4", Duration::from_secs(2)).is_none());
}

#[tokio::test]
async fn test_resolved_adapter_builds_a_runnable_pool() {
    let adapter = client_factory_for("eip155:11155111", Duration::from_secs(2)).unwrap();
    let pool = adapter.build_pool(
        "eip155:11155111",
        &["http://127.0.0.1:1".to_string()],
        PoolConfig::default(),
    );

    pool.start().await.unwrap();
    assert_eq!(pool.chain(), "eip155:11155111");
    assert!(pool.as_evm().is_some());
    assert!(pool.as_svm().is_none());
    assert_eq!(pool.health_status().len(), 1);
    pool.stop().await;
}

#[test]
fn test_namespace_detection() {
    assert_eq!(
        SupportedNamespace::from_chain_id("eip155:1"),
        Some(SupportedNamespace::Eip155)
    );
    assert_eq!(
        SupportedNamespace::from_chain_id("solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"),
        Some(SupportedNamespace::Solana)
    );
    assert_eq!(SupportedNamespace::from_chain_id(""), None);
}
