//! Mock chain data provider for testing without network calls.

use crate::chaindata::rpc_client::search_earliest_block;
use crate::chaindata::{ChainDataProvider, ProviderError};
use crate::domain::{Address, Chain, RawPositionRecord, VaultStaticData};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Mock provider backed by fixture data.
///
/// Block resolution runs the same earliest-block search as the real
/// client, over a synthetic monotonic timestamp series where block `n`
/// has timestamp `series[n]`.
#[derive(Debug, Clone, Default)]
pub struct MockChainProvider {
    vaults: HashMap<Chain, Vec<Address>>,
    vault_data: HashMap<(Chain, String), VaultStaticData>,
    positions: HashMap<(Chain, String), Vec<RawPositionRecord>>,
    block_series: Vec<i64>,
    failing_chains: HashSet<Chain>,
}

impl MockChainProvider {
    /// Create a mock with no fixtures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vault with its static data and holder positions.
    pub fn with_vault(
        mut self,
        chain: Chain,
        data: VaultStaticData,
        positions: Vec<RawPositionRecord>,
    ) -> Self {
        let vault = data.vault_address.clone();
        self.vaults.entry(chain).or_default().push(vault.clone());
        self.positions
            .insert((chain, vault.as_str().to_string()), positions);
        self.vault_data
            .insert((chain, vault.as_str().to_string()), data);
        self
    }

    /// List a vault as eligible without static data, so syncs observe a
    /// vault that disappeared between listing and processing.
    pub fn with_unresolvable_vault(mut self, chain: Chain, vault: Address) -> Self {
        self.vaults.entry(chain).or_default().push(vault);
        self
    }

    /// Use a synthetic monotonic block/timestamp series.
    pub fn with_block_series(mut self, series: Vec<i64>) -> Self {
        self.block_series = series;
        self
    }

    /// Make every listing call for a chain fail.
    pub fn with_failing_chain(mut self, chain: Chain) -> Self {
        self.failing_chains.insert(chain);
        self
    }

    fn check_chain(&self, chain: Chain) -> Result<(), ProviderError> {
        if self.failing_chains.contains(&chain) {
            Err(ProviderError::Network(format!("mock failure on {}", chain)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainDataProvider for MockChainProvider {
    async fn eligible_vaults(&self, chain: Chain) -> Result<Vec<Address>, ProviderError> {
        self.check_chain(chain)?;
        Ok(self.vaults.get(&chain).cloned().unwrap_or_default())
    }

    async fn vault_data(
        &self,
        vault: &Address,
        chain: Chain,
    ) -> Result<Option<VaultStaticData>, ProviderError> {
        self.check_chain(chain)?;
        Ok(self
            .vault_data
            .get(&(chain, vault.as_str().to_string()))
            .cloned())
    }

    async fn vault_positions(
        &self,
        vault: &Address,
        chain: Chain,
        _block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError> {
        self.check_chain(chain)?;
        Ok(self
            .positions
            .get(&(chain, vault.as_str().to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn user_vault_positions(
        &self,
        wallet: &Address,
        chain: Chain,
        _block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError> {
        self.check_chain(chain)?;
        Ok(self
            .positions
            .iter()
            .filter(|((c, _), _)| *c == chain)
            .flat_map(|(_, records)| records.iter())
            .filter(|r| r.account == *wallet)
            .cloned()
            .collect())
    }

    async fn block_by_timestamp(&self, chain: Chain, timestamp: i64) -> Result<u64, ProviderError> {
        self.check_chain(chain)?;
        if self.block_series.is_empty() {
            return Ok(0);
        }
        let head = (self.block_series.len() - 1) as u64;
        let series = self.block_series.clone();
        search_earliest_block(head, timestamp, move |n| {
            let series = series.clone();
            Box::pin(async move {
                series
                    .get(n as usize)
                    .copied()
                    .ok_or(ProviderError::BlockLookup(n))
            })
        })
        .await
    }
}
