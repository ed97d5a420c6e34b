pub mod client;
pub mod proto;
pub mod query;

pub use client::{ConnectionHandle, CoreClient, CoreClientConfig, CoreError};
pub use proto::{ChainConfig, QueryFacade, TokenConfig};
