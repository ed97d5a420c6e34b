//! Hand-modelled wire types for the home chain's query surface.
//!
//! Each struct is a proto-compatible subset of the served message: fields we
//! do not consume are left out and skipped by the decoder. Service paths and
//! tags must match the chain's proto definitions exactly.

use http::uri::PathAndQuery;
use tonic::client::Grpc;
use tonic::transport::Channel;
use tonic_prost::ProstCodec;

// =============================================================================
// uregistry.v1 — chain and token registry
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum VmType {
    Unspecified = 0,
    Evm = 1,
    Svm = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChainConfig {
    /// CAIP-2 identifier, `namespace:reference`.
    #[prost(string, tag = "1")]
    pub chain: String,
    #[prost(string, tag = "2")]
    pub public_rpc_url: String,
    #[prost(string, tag = "3")]
    pub gateway_address: String,
    #[prost(uint64, tag = "4")]
    pub block_confirmations: u64,
    #[prost(uint64, tag = "5")]
    pub gas_limit: u64,
    #[prost(enumeration = "VmType", tag = "6")]
    pub vm_type: i32,
    #[prost(bool, tag = "7")]
    pub enabled: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenConfig {
    #[prost(string, tag = "1")]
    pub chain: String,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub symbol: String,
    #[prost(uint32, tag = "5")]
    pub decimals: u32,
    #[prost(bool, tag = "6")]
    pub enabled: bool,
    #[prost(bool, tag = "7")]
    pub native: bool,
    #[prost(string, tag = "8")]
    pub liquidity_cap: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryChainConfigRequest {
    #[prost(string, tag = "1")]
    pub chain: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryChainConfigResponse {
    #[prost(message, optional, tag = "1")]
    pub config: Option<ChainConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryAllChainConfigsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryAllChainConfigsResponse {
    #[prost(message, repeated, tag = "1")]
    pub configs: Vec<ChainConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryTokenConfigRequest {
    #[prost(string, tag = "1")]
    pub chain: String,
    #[prost(string, tag = "2")]
    pub address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryTokenConfigResponse {
    #[prost(message, optional, tag = "1")]
    pub config: Option<TokenConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryTokenConfigsByChainRequest {
    #[prost(string, tag = "1")]
    pub chain: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryTokenConfigsByChainResponse {
    #[prost(message, repeated, tag = "1")]
    pub configs: Vec<TokenConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryAllTokenConfigsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryAllTokenConfigsResponse {
    #[prost(message, repeated, tag = "1")]
    pub configs: Vec<TokenConfig>,
}

// =============================================================================
// uvalidator.v1 — universal validator set
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UniversalValidator {
    /// Operator address of the backing core validator.
    #[prost(string, tag = "1")]
    pub core_validator_address: String,
    #[prost(string, tag = "2")]
    pub status: String,
    #[prost(string, repeated, tag = "3")]
    pub supported_chains: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryUniversalValidatorsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryUniversalValidatorsResponse {
    #[prost(message, repeated, tag = "1")]
    pub validators: Vec<UniversalValidator>,
}

// =============================================================================
// utss.v1 — threshold signature key
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TssKey {
    #[prost(string, tag = "1")]
    pub key_id: String,
    /// Compressed secp256k1 public key, hex encoded.
    #[prost(string, tag = "2")]
    pub pub_key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryCurrentKeyRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryCurrentKeyResponse {
    #[prost(message, optional, tag = "1")]
    pub key: Option<TssKey>,
}

// =============================================================================
// uexecutor.v1 — gas price oracle
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryGasPriceRequest {
    #[prost(string, tag = "1")]
    pub chain: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryGasPriceResponse {
    /// Validator-posted prices as decimal strings, one per voter.
    #[prost(string, repeated, tag = "1")]
    pub prices: Vec<String>,
    #[prost(uint64, tag = "2")]
    pub median_index: u64,
}

// =============================================================================
// cosmos.base.tendermint.v1beta1 — consensus head
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLatestBlockRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockHeader {
    #[prost(string, tag = "2")]
    pub chain_id: String,
    #[prost(int64, tag = "3")]
    pub height: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Block {
    #[prost(message, optional, tag = "1")]
    pub header: Option<BlockHeader>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLatestBlockResponse {
    #[prost(message, optional, tag = "2")]
    pub block: Option<Block>,
}

// =============================================================================
// cosmos.tx.v1beta1 — transaction search and broadcast
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTxsEventRequest {
    #[prost(string, repeated, tag = "1")]
    pub events: Vec<String>,
    #[prost(uint64, tag = "4")]
    pub page: u64,
    #[prost(uint64, tag = "5")]
    pub limit: u64,
    #[prost(string, tag = "6")]
    pub query: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxResponse {
    #[prost(int64, tag = "1")]
    pub height: i64,
    #[prost(string, tag = "2")]
    pub txhash: String,
    #[prost(uint32, tag = "4")]
    pub code: u32,
    #[prost(string, tag = "6")]
    pub raw_log: String,
    #[prost(int64, tag = "10")]
    pub gas_used: i64,
    #[prost(string, tag = "12")]
    pub timestamp: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTxsEventResponse {
    #[prost(message, repeated, tag = "2")]
    pub tx_responses: Vec<TxResponse>,
    #[prost(uint64, tag = "4")]
    pub total: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BroadcastMode {
    Unspecified = 0,
    Block = 1,
    Sync = 2,
    Async = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BroadcastTxRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub tx_bytes: Vec<u8>,
    #[prost(enumeration = "BroadcastMode", tag = "2")]
    pub mode: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BroadcastTxResponse {
    #[prost(message, optional, tag = "1")]
    pub tx_response: Option<TxResponse>,
}

// =============================================================================
// cosmos.auth.v1beta1 — accounts
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryAccountRequest {
    #[prost(string, tag = "1")]
    pub address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryAccountResponse {
    #[prost(message, optional, tag = "1")]
    pub account: Option<::prost_types::Any>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BaseAccount {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(uint64, tag = "3")]
    pub account_number: u64,
    #[prost(uint64, tag = "4")]
    pub sequence: u64,
}

// =============================================================================
// cosmos.authz.v1beta1 — authorization grants
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryGranteeGrantsRequest {
    #[prost(string, tag = "1")]
    pub grantee: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GrantAuthorization {
    #[prost(string, tag = "1")]
    pub granter: String,
    #[prost(string, tag = "2")]
    pub grantee: String,
    #[prost(message, optional, tag = "3")]
    pub authorization: Option<::prost_types::Any>,
    #[prost(message, optional, tag = "4")]
    pub expiration: Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryGranteeGrantsResponse {
    #[prost(message, repeated, tag = "1")]
    pub grants: Vec<GrantAuthorization>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GenericAuthorization {
    #[prost(string, tag = "1")]
    pub msg: String,
}

// =============================================================================
// Query facade
// =============================================================================

/// Typed, single-connection view of the home chain's query services.
///
/// One facade wraps one dialed channel; failover across channels lives in
/// the fan-out client, not here.
#[derive(Clone)]
pub struct QueryFacade {
    inner: Grpc<Channel>,
}

impl QueryFacade {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(
        &mut self,
        path: &'static str,
        request: Req,
    ) -> Result<Resp, tonic::Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("service was not ready: {e}")))?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        self.inner
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await
            .map(|resp| resp.into_inner())
    }

    pub async fn all_chain_configs(
        &mut self,
        request: QueryAllChainConfigsRequest,
    ) -> Result<QueryAllChainConfigsResponse, tonic::Status> {
        self.unary("/uregistry.v1.Query/AllChainConfigs", request)
            .await
    }

    pub async fn chain_config(
        &mut self,
        request: QueryChainConfigRequest,
    ) -> Result<QueryChainConfigResponse, tonic::Status> {
        self.unary("/uregistry.v1.Query/ChainConfig", request).await
    }

    pub async fn token_config(
        &mut self,
        request: QueryTokenConfigRequest,
    ) -> Result<QueryTokenConfigResponse, tonic::Status> {
        self.unary("/uregistry.v1.Query/TokenConfig", request).await
    }

    pub async fn token_configs_by_chain(
        &mut self,
        request: QueryTokenConfigsByChainRequest,
    ) -> Result<QueryTokenConfigsByChainResponse, tonic::Status> {
        self.unary("/uregistry.v1.Query/TokenConfigsByChain", request)
            .await
    }

    pub async fn all_token_configs(
        &mut self,
        request: QueryAllTokenConfigsRequest,
    ) -> Result<QueryAllTokenConfigsResponse, tonic::Status> {
        self.unary("/uregistry.v1.Query/AllTokenConfigs", request)
            .await
    }

    pub async fn universal_validators(
        &mut self,
        request: QueryUniversalValidatorsRequest,
    ) -> Result<QueryUniversalValidatorsResponse, tonic::Status> {
        self.unary("/uvalidator.v1.Query/UniversalValidators", request)
            .await
    }

    pub async fn current_tss_key(
        &mut self,
        request: QueryCurrentKeyRequest,
    ) -> Result<QueryCurrentKeyResponse, tonic::Status> {
        self.unary("/utss.v1.Query/CurrentKey", request).await
    }

    pub async fn gas_price(
        &mut self,
        request: QueryGasPriceRequest,
    ) -> Result<QueryGasPriceResponse, tonic::Status> {
        self.unary("/uexecutor.v1.Query/GasPrice", request).await
    }

    pub async fn latest_block(
        &mut self,
        request: GetLatestBlockRequest,
    ) -> Result<GetLatestBlockResponse, tonic::Status> {
        self.unary(
            "/cosmos.base.tendermint.v1beta1.Service/GetLatestBlock",
            request,
        )
        .await
    }

    pub async fn txs_by_events(
        &mut self,
        request: GetTxsEventRequest,
    ) -> Result<GetTxsEventResponse, tonic::Status> {
        self.unary("/cosmos.tx.v1beta1.Service/GetTxsEvent", request)
            .await
    }

    pub async fn broadcast_tx(
        &mut self,
        request: BroadcastTxRequest,
    ) -> Result<BroadcastTxResponse, tonic::Status> {
        self.unary("/cosmos.tx.v1beta1.Service/BroadcastTx", request)
            .await
    }

    pub async fn account(
        &mut self,
        request: QueryAccountRequest,
    ) -> Result<QueryAccountResponse, tonic::Status> {
        self.unary("/cosmos.auth.v1beta1.Query/Account", request)
            .await
    }

    pub async fn grantee_grants(
        &mut self,
        request: QueryGranteeGrantsRequest,
    ) -> Result<QueryGranteeGrantsResponse, tonic::Status> {
        self.unary("/cosmos.authz.v1beta1.Query/GranteeGrants", request)
            .await
    }
}
