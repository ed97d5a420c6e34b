//! Universal client library.
//!
//! Off-chain validator agent that watches external chains through per-chain
//! RPC endpoint pools, keeps a registry cache in sync with the home chain,
//! and submits signed votes back over a fan-out gRPC client.

pub mod config;
pub mod services;

pub use config::environment::Config;
pub use services::core::CoreClient;
pub use services::registry::ConfigCache;
pub use services::rpc::RpcPool;
