//! Typed query surface over the fan-out client.
//!
//! Every method funnels through [`CoreClient::execute_with_retry`], so
//! failover and backoff behave identically across the whole surface.

use prost::Message;
use tracing::warn;

use crate::services::core::client::{CoreClient, CoreError};
use crate::services::core::proto::{
    BaseAccount, BroadcastMode, BroadcastTxRequest, ChainConfig, GetLatestBlockRequest,
    GetTxsEventRequest, GrantAuthorization, QueryAccountRequest, QueryAllChainConfigsRequest,
    QueryAllTokenConfigsRequest, QueryChainConfigRequest, QueryCurrentKeyRequest,
    QueryGasPriceRequest, QueryGranteeGrantsRequest, QueryTokenConfigRequest,
    QueryTokenConfigsByChainRequest, QueryUniversalValidatorsRequest, TokenConfig, TssKey,
    TxResponse, UniversalValidator,
};

const BASE_ACCOUNT_TYPE_URL_SUFFIX: &str = ".BaseAccount";
const TX_SEARCH_PAGE_LIMIT: u64 = 100;

impl CoreClient {
    pub async fn all_chain_configs(&self) -> Result<Vec<ChainConfig>, CoreError> {
        let resp = self
            .execute_with_retry("AllChainConfigs", |conn| async move {
                conn.facade()
                    .all_chain_configs(QueryAllChainConfigsRequest {})
                    .await
                    .map_err(CoreError::from)
            })
            .await?;
        Ok(resp.configs)
    }

    pub async fn chain_config(&self, chain: &str) -> Result<ChainConfig, CoreError> {
        let request = QueryChainConfigRequest {
            chain: chain.to_string(),
        };
        let resp = self
            .execute_with_retry("ChainConfig", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .chain_config(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        resp.config
            .ok_or_else(|| CoreError::NotFound(format!("chain config for {chain}")))
    }

    pub async fn all_token_configs(&self) -> Result<Vec<TokenConfig>, CoreError> {
        let resp = self
            .execute_with_retry("AllTokenConfigs", |conn| async move {
                conn.facade()
                    .all_token_configs(QueryAllTokenConfigsRequest {})
                    .await
                    .map_err(CoreError::from)
            })
            .await?;
        Ok(resp.configs)
    }

    pub async fn token_config(&self, chain: &str, address: &str) -> Result<TokenConfig, CoreError> {
        let request = QueryTokenConfigRequest {
            chain: chain.to_string(),
            address: address.to_string(),
        };
        let resp = self
            .execute_with_retry("TokenConfig", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .token_config(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        resp.config
            .ok_or_else(|| CoreError::NotFound(format!("token config for {address} on {chain}")))
    }

    pub async fn token_configs_by_chain(
        &self,
        chain: &str,
    ) -> Result<Vec<TokenConfig>, CoreError> {
        let request = QueryTokenConfigsByChainRequest {
            chain: chain.to_string(),
        };
        let resp = self
            .execute_with_retry("TokenConfigsByChain", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .token_configs_by_chain(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        Ok(resp.configs)
    }

    /// Height of the home chain's consensus head.
    pub async fn latest_block_height(&self) -> Result<u64, CoreError> {
        let resp = self
            .execute_with_retry("GetLatestBlock", |conn| async move {
                conn.facade()
                    .latest_block(GetLatestBlockRequest {})
                    .await
                    .map_err(CoreError::from)
            })
            .await?;
        resp.block
            .and_then(|block| block.header)
            .map(|header| header.height as u64)
            .ok_or_else(|| CoreError::Decode("latest block response missing header".to_string()))
    }

    pub async fn universal_validators(&self) -> Result<Vec<UniversalValidator>, CoreError> {
        let resp = self
            .execute_with_retry("UniversalValidators", |conn| async move {
                conn.facade()
                    .universal_validators(QueryUniversalValidatorsRequest {})
                    .await
                    .map_err(CoreError::from)
            })
            .await?;
        Ok(resp.validators)
    }

    pub async fn current_tss_key(&self) -> Result<TssKey, CoreError> {
        let resp = self
            .execute_with_retry("CurrentTssKey", |conn| async move {
                conn.facade()
                    .current_tss_key(QueryCurrentKeyRequest {})
                    .await
                    .map_err(CoreError::from)
            })
            .await?;
        resp.key
            .ok_or_else(|| CoreError::NotFound("current tss key".to_string()))
    }

    /// Search historical transactions by event filters, optionally bounded
    /// by block height.
    pub async fn txs_by_events(
        &self,
        events: &[String],
        min_height: Option<u64>,
        max_height: Option<u64>,
    ) -> Result<Vec<TxResponse>, CoreError> {
        let request = GetTxsEventRequest {
            events: events.to_vec(),
            page: 1,
            limit: TX_SEARCH_PAGE_LIMIT,
            query: build_tx_query(events, min_height, max_height),
        };
        let resp = self
            .execute_with_retry("GetTxsEvent", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .txs_by_events(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        Ok(resp.tx_responses)
    }

    /// Median gas price posted for a chain, as reported by the oracle.
    ///
    /// An empty price vector is an error; an out-of-range median index falls
    /// back to the first price.
    pub async fn gas_price(&self, chain: &str) -> Result<u128, CoreError> {
        let request = QueryGasPriceRequest {
            chain: chain.to_string(),
        };
        let resp = self
            .execute_with_retry("GasPrice", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .gas_price(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        select_median_price(&resp.prices, resp.median_index, chain)
    }

    /// Account lookup, decoded from the registered account `Any`.
    pub async fn account(&self, address: &str) -> Result<BaseAccount, CoreError> {
        let request = QueryAccountRequest {
            address: address.to_string(),
        };
        let resp = self
            .execute_with_retry("Account", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .account(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        let any = resp
            .account
            .ok_or_else(|| CoreError::NotFound(format!("account {address}")))?;
        if !any.type_url.ends_with(BASE_ACCOUNT_TYPE_URL_SUFFIX) {
            return Err(CoreError::Decode(format!(
                "unsupported account type {}",
                any.type_url
            )));
        }
        BaseAccount::decode(any.value.as_slice())
            .map_err(|e| CoreError::Decode(format!("account {address}: {e}")))
    }

    /// All authorization grants where the given address is the grantee.
    pub async fn grantee_grants(
        &self,
        grantee: &str,
    ) -> Result<Vec<GrantAuthorization>, CoreError> {
        let request = QueryGranteeGrantsRequest {
            grantee: grantee.to_string(),
        };
        let resp = self
            .execute_with_retry("GranteeGrants", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .grantee_grants(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        Ok(resp.grants)
    }

    /// Submit a signed transaction in sync broadcast mode and surface the
    /// chain's response.
    pub async fn broadcast_tx(&self, tx_bytes: Vec<u8>) -> Result<TxResponse, CoreError> {
        let request = BroadcastTxRequest {
            tx_bytes,
            mode: BroadcastMode::Sync as i32,
        };
        let resp = self
            .execute_with_retry("BroadcastTx", |conn| {
                let request = request.clone();
                async move {
                    conn.facade()
                        .broadcast_tx(request)
                        .await
                        .map_err(CoreError::from)
                }
            })
            .await?;
        resp.tx_response
            .ok_or_else(|| CoreError::Decode("broadcast response missing tx_response".to_string()))
    }
}

fn build_tx_query(events: &[String], min_height: Option<u64>, max_height: Option<u64>) -> String {
    let mut clauses: Vec<String> = events.to_vec();
    if let Some(min) = min_height {
        clauses.push(format!("tx.height>={min}"));
    }
    if let Some(max) = max_height {
        clauses.push(format!("tx.height<={max}"));
    }
    clauses.join(" AND ")
}

pub(crate) fn select_median_price(
    prices: &[String],
    median_index: u64,
    chain: &str,
) -> Result<u128, CoreError> {
    if prices.is_empty() {
        return Err(CoreError::NoGasPrices);
    }
    let idx = median_index as usize;
    let raw = if idx < prices.len() {
        &prices[idx]
    } else {
        warn!(
            chain,
            median_index, prices = prices.len(),
            "median index out of bounds, falling back to first price"
        );
        &prices[0]
    };
    raw.parse::<u128>()
        .map_err(|e| CoreError::Decode(format!("gas price {raw} for {chain}: {e}")))
}
