//! Graph-indexed chain data provider.
//!
//! Queries a per-chain subgraph for eligible vaults, vault static data,
//! and share-balance positions. Timestamp→block resolution is delegated
//! to the shared RPC client, since subgraphs cannot answer it.

use crate::cache::TtlCache;
use crate::chaindata::{
    ChainDataProvider, ProviderError, RpcClient, ELIGIBLE_ASSET_SYMBOLS,
};
use crate::domain::{Address, Chain, RawPositionRecord, VaultStaticData};
use alloy_primitives::U256;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Page size for per-vault position scans.
const VAULT_PAGE_SIZE: usize = 1000;
/// Page size for per-wallet position scans; results are bounded by the
/// number of eligible vaults a wallet can hold.
const USER_PAGE_SIZE: usize = 100;

/// Chain data provider backed by an indexed subgraph per chain.
#[derive(Debug)]
pub struct SubgraphProvider {
    client: Client,
    endpoints: HashMap<Chain, String>,
    rpc: Arc<RpcClient>,
    vault_list_cache: TtlCache<Chain, Vec<Address>>,
    vault_data_cache: TtlCache<(Chain, String), VaultStaticData>,
}

impl SubgraphProvider {
    /// Create a provider over per-chain subgraph endpoints, delegating
    /// block resolution to `rpc`.
    pub fn new(
        endpoints: HashMap<Chain, String>,
        rpc: Arc<RpcClient>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            rpc,
            vault_list_cache: TtlCache::new(cache_ttl),
            vault_data_cache: TtlCache::new(cache_ttl),
        }
    }

    fn endpoint(&self, chain: Chain) -> Result<&str, ProviderError> {
        self.endpoints
            .get(&chain)
            .map(|s| s.as_str())
            .ok_or(ProviderError::UnsupportedChain(chain))
    }

    async fn query(
        &self,
        chain: Chain,
        query: &str,
        variables: Value,
    ) -> Result<Value, ProviderError> {
        let url = self.endpoint(chain)?;
        let payload = json!({ "query": query, "variables": variables });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(errors) = body.get("errors") {
            return Err(ProviderError::Malformed(format!(
                "subgraph errors: {}",
                errors
            )));
        }

        body.get("data")
            .cloned()
            .ok_or_else(|| ProviderError::Malformed("missing data field".to_string()))
    }

    /// Page through a position query until a short page signals
    /// end-of-data.
    async fn paged_positions(
        &self,
        chain: Chain,
        query: &str,
        mut variables: Value,
        page_size: usize,
    ) -> Result<Vec<RawPositionRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut skip = 0usize;

        loop {
            variables["first"] = json!(page_size);
            variables["skip"] = json!(skip);
            let data = self.query(chain, query, variables.clone()).await?;
            let page = data
                .get("positions")
                .and_then(|p| p.as_array())
                .ok_or_else(|| {
                    ProviderError::Malformed("missing positions in response".to_string())
                })?;

            let page_len = page.len();
            for item in page {
                records.push(parse_position(item)?);
            }

            if page_len < page_size {
                break;
            }
            skip += page_size;
        }

        Ok(records)
    }
}

#[async_trait]
impl ChainDataProvider for SubgraphProvider {
    async fn eligible_vaults(&self, chain: Chain) -> Result<Vec<Address>, ProviderError> {
        if let Some(vaults) = self.vault_list_cache.get(&chain).await {
            return Ok(vaults);
        }

        const QUERY: &str = r#"
            query EligibleVaults($symbols: [String!]!) {
                vaults(
                    where: { assetSymbol_in: $symbols, totalAssets_gt: "0" }
                    orderBy: totalAssets
                    orderDirection: desc
                    first: 1000
                ) {
                    id
                }
            }
        "#;

        let data = self
            .query(chain, QUERY, json!({ "symbols": ELIGIBLE_ASSET_SYMBOLS }))
            .await?;
        let vaults: Vec<Address> = data
            .get("vaults")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::Malformed("missing vaults in response".to_string()))?
            .iter()
            .filter_map(|v| v.get("id").and_then(|id| id.as_str()))
            .map(Address::new)
            .collect();

        debug!(%chain, count = vaults.len(), "eligible vaults from subgraph");
        self.vault_list_cache.insert(chain, vaults.clone()).await;
        Ok(vaults)
    }

    async fn vault_data(
        &self,
        vault: &Address,
        chain: Chain,
    ) -> Result<Option<VaultStaticData>, ProviderError> {
        let cache_key = (chain, vault.as_str().to_string());
        if let Some(data) = self.vault_data_cache.get(&cache_key).await {
            return Ok(Some(data));
        }

        const QUERY: &str = r#"
            query VaultData($id: ID!) {
                vault(id: $id) {
                    id
                    totalAssets
                    totalSupply
                    asset { id symbol decimals }
                }
            }
        "#;

        let data = self
            .query(chain, QUERY, json!({ "id": vault.as_str() }))
            .await?;
        let vault_json = match data.get("vault") {
            Some(v) if !v.is_null() => v,
            _ => return Ok(None),
        };

        let asset = vault_json
            .get("asset")
            .filter(|a| !a.is_null())
            .ok_or_else(|| ProviderError::Malformed("vault missing asset".to_string()))?;

        let static_data = VaultStaticData {
            vault_address: vault.clone(),
            total_assets: parse_u256_field(vault_json, "totalAssets")?,
            total_supply: parse_u256_field(vault_json, "totalSupply")?,
            asset_address: asset
                .get("id")
                .and_then(|id| id.as_str())
                .map(Address::new)
                .ok_or_else(|| ProviderError::Malformed("asset missing id".to_string()))?,
            asset_symbol: asset
                .get("symbol")
                .and_then(|s| s.as_str())
                .map(|s| s.to_uppercase())
                .ok_or_else(|| ProviderError::Malformed("asset missing symbol".to_string()))?,
            asset_decimals: asset
                .get("decimals")
                .and_then(|d| d.as_u64())
                .and_then(|d| u8::try_from(d).ok())
                .ok_or_else(|| ProviderError::Malformed("asset missing decimals".to_string()))?,
        };

        self.vault_data_cache
            .insert(cache_key, static_data.clone())
            .await;
        Ok(Some(static_data))
    }

    async fn vault_positions(
        &self,
        vault: &Address,
        chain: Chain,
        block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError> {
        // Two query shapes: the block argument pins every page of the
        // scan to one snapshot when supplied.
        const QUERY_AT_BLOCK: &str = r#"
            query VaultPositions($vault: String!, $first: Int!, $skip: Int!, $block: Int!) {
                positions(
                    where: { vault: $vault, shares_gt: "0" }
                    first: $first
                    skip: $skip
                    block: { number: $block }
                    orderBy: id
                ) {
                    account
                    shares
                    lastUpdated
                }
            }
        "#;
        const QUERY_LATEST: &str = r#"
            query VaultPositions($vault: String!, $first: Int!, $skip: Int!) {
                positions(
                    where: { vault: $vault, shares_gt: "0" }
                    first: $first
                    skip: $skip
                    orderBy: id
                ) {
                    account
                    shares
                    lastUpdated
                }
            }
        "#;

        let (query, variables) = match block {
            Some(b) => (QUERY_AT_BLOCK, json!({ "vault": vault.as_str(), "block": b })),
            None => (QUERY_LATEST, json!({ "vault": vault.as_str() })),
        };

        let mut records = self
            .paged_positions(chain, query, variables, VAULT_PAGE_SIZE)
            .await?;
        for record in &mut records {
            record.vault_address = vault.clone();
        }
        Ok(records)
    }

    async fn user_vault_positions(
        &self,
        wallet: &Address,
        chain: Chain,
        block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError> {
        const QUERY_AT_BLOCK: &str = r#"
            query UserPositions($account: String!, $first: Int!, $skip: Int!, $block: Int!) {
                positions(
                    where: { account: $account, shares_gt: "0" }
                    first: $first
                    skip: $skip
                    block: { number: $block }
                    orderBy: id
                ) {
                    vault
                    account
                    shares
                    lastUpdated
                }
            }
        "#;
        const QUERY_LATEST: &str = r#"
            query UserPositions($account: String!, $first: Int!, $skip: Int!) {
                positions(
                    where: { account: $account, shares_gt: "0" }
                    first: $first
                    skip: $skip
                    orderBy: id
                ) {
                    vault
                    account
                    shares
                    lastUpdated
                }
            }
        "#;

        let (query, variables) = match block {
            Some(b) => (
                QUERY_AT_BLOCK,
                json!({ "account": wallet.as_str(), "block": b }),
            ),
            None => (QUERY_LATEST, json!({ "account": wallet.as_str() })),
        };

        self.paged_positions(chain, query, variables, USER_PAGE_SIZE)
            .await
    }

    async fn block_by_timestamp(&self, chain: Chain, timestamp: i64) -> Result<u64, ProviderError> {
        self.rpc.block_by_timestamp(chain, timestamp).await
    }
}

fn parse_u256_field(value: &Value, field: &str) -> Result<U256, ProviderError> {
    let raw = value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::Malformed(format!("missing {} field", field)))?;
    U256::from_str(raw)
        .map_err(|e| ProviderError::Malformed(format!("invalid {} value {}: {}", field, raw, e)))
}

fn parse_position(item: &Value) -> Result<RawPositionRecord, ProviderError> {
    let account = item
        .get("account")
        .and_then(|a| a.as_str())
        .ok_or_else(|| ProviderError::Malformed("position missing account".to_string()))?;
    let shares = parse_u256_field(item, "shares")?;
    let last_updated = item
        .get("lastUpdated")
        .and_then(|v| v.as_str().map(|s| s.parse::<i64>().ok()).unwrap_or(v.as_i64()));
    let vault = item
        .get("vault")
        .and_then(|v| v.as_str())
        .map(Address::new)
        .unwrap_or_else(|| Address::new(""));

    Ok(RawPositionRecord {
        vault_address: vault,
        account: Address::new(account),
        shares,
        last_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_with_string_fields() {
        let item = json!({
            "vault": "0xVAULT123",
            "account": "0xWALLET123",
            "shares": "100000000000000000000",
            "lastUpdated": "1710000000"
        });
        let record = parse_position(&item).unwrap();
        assert_eq!(record.vault_address.as_str(), "0xvault123");
        assert_eq!(record.account.as_str(), "0xwallet123");
        assert_eq!(
            record.shares,
            U256::from_str("100000000000000000000").unwrap()
        );
        assert_eq!(record.last_updated, Some(1710000000));
    }

    #[test]
    fn test_parse_position_rejects_bad_shares() {
        let item = json!({ "account": "0xa", "shares": "not-a-number" });
        assert!(parse_position(&item).is_err());
    }

    #[test]
    fn test_parse_u256_field_large_value() {
        let value = json!({ "totalAssets": "999999999999999999999999999999" });
        let parsed = parse_u256_field(&value, "totalAssets").unwrap();
        assert_eq!(
            parsed,
            U256::from_str("999999999999999999999999999999").unwrap()
        );
    }
}
