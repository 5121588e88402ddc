//! Direct-RPC chain data provider.
//!
//! Reads ERC-4626 vault state with `eth_call` instead of an index.
//! Holder discovery for a vault scans ERC-20 Transfer logs over a
//! bounded lookback window and confirms each candidate with a
//! `balanceOf` read pinned to the snapshot block; full-chain holder
//! enumeration without an index is not viable, so accounts whose last
//! transfer predates the window are not discovered on chains where no
//! subgraph is available.

use crate::cache::TtlCache;
use crate::chaindata::{abi, ChainDataProvider, ProviderError, RpcClient};
use crate::domain::{Address, Chain, RawPositionRecord, VaultStaticData};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Candidate holders checked per concurrent `balanceOf` batch.
const BALANCE_BATCH: usize = 20;

/// Chain data provider over direct JSON-RPC contract calls.
#[derive(Debug)]
pub struct RpcProvider {
    rpc: Arc<RpcClient>,
    eligible: HashMap<Chain, Vec<Address>>,
    vault_data_cache: TtlCache<(Chain, String), VaultStaticData>,
    transfer_lookback_blocks: u64,
}

impl RpcProvider {
    /// Create a provider with per-chain eligible-vault allow-lists from
    /// configuration.
    pub fn new(
        rpc: Arc<RpcClient>,
        eligible: HashMap<Chain, Vec<Address>>,
        cache_ttl: Duration,
        transfer_lookback_blocks: u64,
    ) -> Self {
        Self {
            rpc,
            eligible,
            vault_data_cache: TtlCache::new(cache_ttl),
            transfer_lookback_blocks,
        }
    }

    /// One `eth_call` + uint256 decode, as `None` on contract variance.
    async fn call_u256(
        &self,
        chain: Chain,
        to: &Address,
        data: &str,
        block: Option<u64>,
    ) -> Result<Option<alloy_primitives::U256>, ProviderError> {
        match self.rpc.eth_call(chain, to.as_str(), data, block).await? {
            Some(bytes) => abi::decode_u256(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Holder candidates from Transfer logs over the lookback window.
    async fn discover_holders(
        &self,
        vault: &Address,
        chain: Chain,
        block: u64,
    ) -> Result<BTreeSet<Address>, ProviderError> {
        let from_block = block.saturating_sub(self.transfer_lookback_blocks);
        let logs = self
            .rpc
            .get_logs(chain, vault.as_str(), abi::TRANSFER_TOPIC, from_block, block)
            .await?;

        let zero = Address::new("0x0000000000000000000000000000000000000000");
        let mut holders = BTreeSet::new();
        for log in &logs {
            let topics = match log.get("topics").and_then(|t| t.as_array()) {
                Some(t) => t,
                None => continue,
            };
            // topics[1] = from, topics[2] = to; both sides can still
            // hold a balance at the snapshot block.
            for topic in topics.iter().skip(1).take(2) {
                if let Some(word) = topic.as_str() {
                    if let Ok(bytes) = abi::decode_hex(word) {
                        if let Ok(addr) = abi::decode_address(&bytes) {
                            if addr != zero {
                                holders.insert(addr);
                            }
                        }
                    }
                }
            }
        }

        debug!(
            %chain,
            vault = %vault,
            from_block,
            to_block = block,
            candidates = holders.len(),
            "holder discovery from transfer logs"
        );
        Ok(holders)
    }
}

#[async_trait]
impl ChainDataProvider for RpcProvider {
    async fn eligible_vaults(&self, chain: Chain) -> Result<Vec<Address>, ProviderError> {
        // Allow-lists come from configuration; an unconfigured chain
        // simply has nothing to sync.
        Ok(self.eligible.get(&chain).cloned().unwrap_or_default())
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

        let total_assets = match self
            .call_u256(chain, vault, abi::SEL_TOTAL_ASSETS, None)
            .await?
        {
            Some(v) => v,
            None => {
                warn!(vault = %vault, %chain, "vault does not answer totalAssets, skipping");
                return Ok(None);
            }
        };
        let total_supply = match self
            .call_u256(chain, vault, abi::SEL_TOTAL_SUPPLY, None)
            .await?
        {
            Some(v) => v,
            None => return Ok(None),
        };

        let asset_address = match self
            .rpc
            .eth_call(chain, vault.as_str(), abi::SEL_ASSET, None)
            .await?
        {
            Some(bytes) => abi::decode_address(&bytes)?,
            None => return Ok(None),
        };

        let symbol = match self
            .rpc
            .eth_call(chain, asset_address.as_str(), abi::SEL_SYMBOL, None)
            .await?
        {
            Some(bytes) => abi::decode_symbol(&bytes)?.to_uppercase(),
            None => return Ok(None),
        };
        let decimals = match self
            .rpc
            .eth_call(chain, asset_address.as_str(), abi::SEL_DECIMALS, None)
            .await?
        {
            Some(bytes) => abi::decode_u8(&bytes)?,
            None => return Ok(None),
        };

        let data = VaultStaticData {
            vault_address: vault.clone(),
            total_assets,
            total_supply,
            asset_address,
            asset_symbol: symbol,
            asset_decimals: decimals,
        };
        self.vault_data_cache.insert(cache_key, data.clone()).await;
        Ok(Some(data))
    }

    async fn vault_positions(
        &self,
        vault: &Address,
        chain: Chain,
        block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError> {
        let block = match block {
            Some(b) => b,
            None => self.rpc.head_block(chain).await?,
        };

        let holders = self.discover_holders(vault, chain, block).await?;
        let holders: Vec<Address> = holders.into_iter().collect();
        let mut records = Vec::new();

        // Confirm candidates in bounded concurrent batches; every read
        // is pinned to the same block.
        for batch in holders.chunks(BALANCE_BATCH) {
            let balances = join_all(batch.iter().map(|holder| async {
                let data = abi::encode_call_address(abi::SEL_BALANCE_OF, holder)?;
                self.call_u256(chain, vault, &data, Some(block)).await
            }))
            .await;

            for (holder, balance) in batch.iter().zip(balances) {
                if let Some(shares) = balance? {
                    if !shares.is_zero() {
                        records.push(RawPositionRecord {
                            vault_address: vault.clone(),
                            account: holder.clone(),
                            shares,
                            last_updated: None,
                        });
                    }
                }
            }
        }

        Ok(records)
    }

    async fn user_vault_positions(
        &self,
        wallet: &Address,
        chain: Chain,
        block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError> {
        let vaults = self.eligible_vaults(chain).await?;
        let data = abi::encode_call_address(abi::SEL_BALANCE_OF, wallet)?;

        let mut records = Vec::new();
        for vault in &vaults {
            if let Some(shares) = self.call_u256(chain, vault, &data, block).await? {
                if !shares.is_zero() {
                    records.push(RawPositionRecord {
                        vault_address: vault.clone(),
                        account: wallet.clone(),
                        shares,
                        last_updated: None,
                    });
                }
            }
        }

        Ok(records)
    }

    async fn block_by_timestamp(&self, chain: Chain, timestamp: i64) -> Result<u64, ProviderError> {
        self.rpc.block_by_timestamp(chain, timestamp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_vaults(vaults: Vec<Address>) -> RpcProvider {
        let rpc = Arc::new(RpcClient::new(HashMap::new(), Duration::from_secs(60)));
        let mut eligible = HashMap::new();
        eligible.insert(Chain::Base, vaults);
        RpcProvider::new(rpc, eligible, Duration::from_secs(60), 100_000)
    }

    #[tokio::test]
    async fn test_eligible_vaults_from_config() {
        let provider =
            provider_with_vaults(vec![Address::new("0xVaultA"), Address::new("0xvaultb")]);
        let vaults = provider.eligible_vaults(Chain::Base).await.unwrap();
        assert_eq!(vaults.len(), 2);
        assert_eq!(vaults[0].as_str(), "0xvaulta");
    }

    #[tokio::test]
    async fn test_unconfigured_chain_is_empty_not_error() {
        let provider = provider_with_vaults(vec![]);
        let vaults = provider.eligible_vaults(Chain::Optimism).await.unwrap();
        assert!(vaults.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_rpc_endpoint_is_unsupported_chain() {
        let provider = provider_with_vaults(vec![]);
        let err = provider
            .block_by_timestamp(Chain::Base, 1_700_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedChain(Chain::Base)));
    }
}
