//! Vault sync orchestrator: converts discovered share balances into
//! valued point-in-time snapshots.

use crate::chaindata::{ChainDataProvider, ProviderError};
use crate::domain::math;
use crate::domain::{Address, Chain, RawPositionRecord, SnapshotDate, VaultPosition, VaultStaticData};
use crate::pricing::{PriceError, PriceOracle};
use crate::store::{SnapshotStore, StoreError};
use crate::sync::queue::{QueueError, TaskQueue, VaultSyncJob};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Orchestrates the daily full-chain resync and the on-demand
/// wallet-scoped sync used before reward distribution.
#[derive(Debug, Clone)]
pub struct VaultSyncService {
    provider: Arc<dyn ChainDataProvider>,
    oracle: Arc<dyn PriceOracle>,
    store: Arc<dyn SnapshotStore>,
    queue: Arc<dyn TaskQueue>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Price(#[from] PriceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl VaultSyncService {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        oracle: Arc<dyn PriceOracle>,
        store: Arc<dyn SnapshotStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            provider,
            oracle,
            store,
            queue,
        }
    }

    /// Daily full resync: one snapshot date for every supported chain,
    /// processed sequentially. A failing chain is logged and skipped so
    /// the remaining chains still run.
    pub async fn run_daily_sync(&self) {
        let date = SnapshotDate::today();
        info!(%date, "starting daily vault sync");
        for chain in Chain::ALL {
            if let Err(e) = self.sync_chain_vaults(chain, date).await {
                error!(%chain, "chain sync failed, continuing with remaining chains: {}", e);
            }
        }
    }

    /// Purge-then-enqueue for one chain.
    ///
    /// Deleting all (date, chain) snapshots before fanning out makes
    /// re-runs for the same date idempotent: a previous run's rows for
    /// vaults that are no longer eligible cannot linger. With no
    /// eligible vaults there is nothing to purge or enqueue, and the
    /// store is not touched at all.
    pub async fn sync_chain_vaults(
        &self,
        chain: Chain,
        date: SnapshotDate,
    ) -> Result<(), SyncError> {
        let vaults = self.provider.eligible_vaults(chain).await?;
        if vaults.is_empty() {
            info!(%chain, "no eligible vaults, nothing to sync");
            return Ok(());
        }

        let deleted = self.store.delete_by_date_and_chain(date, chain).await?;
        info!(
            %chain,
            %date,
            deleted,
            vaults = vaults.len(),
            "purged stale snapshots, enqueueing per-vault tasks"
        );

        for vault in vaults {
            self.queue
                .enqueue(VaultSyncJob::new(chain, vault, date))
                .await?;
        }
        Ok(())
    }

    /// Worker body for one queued vault sync task.
    ///
    /// A vault that disappeared between listing and sync (null static
    /// data) is a no-op, not an error — expected under reorgs and
    /// indexing lag. Provider and pricing failures propagate to the
    /// queue's retry mechanism.
    pub async fn process_vault_sync(&self, job: &VaultSyncJob) -> Result<(), SyncError> {
        let block = match job.block_number {
            Some(b) => b,
            None => {
                self.provider
                    .block_by_timestamp(job.chain, job.snapshot_date.to_utc_midnight_ts())
                    .await?
            }
        };

        let (data, records) = tokio::try_join!(
            self.provider.vault_data(&job.vault_address, job.chain),
            self.provider
                .vault_positions(&job.vault_address, job.chain, Some(block)),
        )?;

        let data = match data {
            Some(d) => d,
            None => {
                warn!(
                    vault = %job.vault_address,
                    chain = %job.chain,
                    "vault not resolvable, skipping this cycle"
                );
                return Ok(());
            }
        };

        if data.total_supply.is_zero() {
            debug!(
                vault = %job.vault_address,
                chain = %job.chain,
                "vault has zero total supply, no positions materialized"
            );
            return Ok(());
        }

        // One price per vault, not per position.
        let price = self.oracle.token_price(&data.asset_symbol).await?;

        let positions: Vec<VaultPosition> = records
            .iter()
            .filter_map(|record| {
                build_position(record, &data, job.chain, Some(price), job.snapshot_date, block)
            })
            .collect();

        if positions.is_empty() {
            debug!(vault = %job.vault_address, chain = %job.chain, "no positions to persist");
            return Ok(());
        }

        self.store.create_batch(&positions).await?;
        info!(
            vault = %job.vault_address,
            chain = %job.chain,
            block,
            positions = positions.len(),
            "vault snapshot persisted"
        );
        Ok(())
    }

    /// On-demand wallet-scoped sync, invoked synchronously before
    /// reward distribution.
    ///
    /// Upserts each position by its natural key so other wallets'
    /// same-day snapshots are untouched. A symbol missing from the
    /// batched price response values that position at 0 rather than
    /// failing the sync; every other error propagates to the caller,
    /// who must not proceed with incomplete valuation silently.
    pub async fn sync_wallet_positions(
        &self,
        wallet: &Address,
        season_id: &str,
        chain: Chain,
        date: SnapshotDate,
    ) -> Result<Vec<VaultPosition>, SyncError> {
        let block = self
            .provider
            .block_by_timestamp(chain, date.to_utc_midnight_ts())
            .await?;
        let records = self
            .provider
            .user_vault_positions(wallet, chain, Some(block))
            .await?;
        if records.is_empty() {
            debug!(wallet = %wallet, %chain, "wallet holds no eligible vault positions");
            return Ok(Vec::new());
        }

        let mut vault_data: HashMap<String, VaultStaticData> = HashMap::new();
        for record in &records {
            let key = record.vault_address.as_str().to_string();
            if vault_data.contains_key(&key) {
                continue;
            }
            match self.provider.vault_data(&record.vault_address, chain).await? {
                Some(data) => {
                    vault_data.insert(key, data);
                }
                None => {
                    warn!(vault = %record.vault_address, %chain, "vault not resolvable, position skipped");
                }
            }
        }

        let mut symbols: Vec<String> = vault_data
            .values()
            .map(|d| d.asset_symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        let prices = self.oracle.multiple_token_prices(&symbols).await?;

        let mut synced = Vec::new();
        for record in &records {
            let data = match vault_data.get(record.vault_address.as_str()) {
                Some(d) => d,
                None => continue,
            };
            let price = prices.get(&data.asset_symbol).copied();
            let position = match build_position(record, data, chain, price, date, block) {
                Some(p) => p,
                None => continue,
            };
            synced.push(self.store.upsert(&position).await?);
        }

        info!(
            wallet = %wallet,
            season = season_id,
            %chain,
            %date,
            count = synced.len(),
            "wallet positions synced"
        );
        Ok(synced)
    }

    /// USD value of one persisted (wallet, vault) snapshot on a date,
    /// or 0 when absent. Address matching is case-insensitive.
    pub async fn historical_vault_value(
        &self,
        wallet: &Address,
        vault: &Address,
        date: SnapshotDate,
    ) -> Result<f64, SyncError> {
        let positions = self.store.find_by_wallet_and_date(wallet, date).await?;
        Ok(positions
            .iter()
            .find(|p| p.vault_address == *vault)
            .map(|p| p.usd_value)
            .unwrap_or(0.0))
    }

    /// Sum of a wallet's persisted snapshot values on a date, filtered
    /// to one chain.
    pub async fn total_vault_value(
        &self,
        wallet: &Address,
        chain: Chain,
        date: SnapshotDate,
    ) -> Result<f64, SyncError> {
        let positions = self.store.find_by_wallet_and_date(wallet, date).await?;
        Ok(positions
            .iter()
            .filter(|p| p.chain == chain)
            .map(|p| p.usd_value)
            .sum())
    }

    /// Live (non-persisted) read of a wallet's current position in one
    /// vault. `None` block reads at the chain head — the sensible
    /// default for a "current position" read.
    pub async fn vault_position(
        &self,
        wallet: &Address,
        vault: &Address,
        chain: Chain,
        block: Option<u64>,
    ) -> Result<Option<VaultPosition>, SyncError> {
        let records = self
            .provider
            .user_vault_positions(wallet, chain, block)
            .await?;
        let record = match records.into_iter().find(|r| r.vault_address == *vault) {
            Some(r) => r,
            None => return Ok(None),
        };

        let data = match self.provider.vault_data(vault, chain).await? {
            Some(d) => d,
            None => return Ok(None),
        };
        let price = self.oracle.token_price(&data.asset_symbol).await?;

        // block_number 0 marks "read at latest"; the entity is never
        // persisted from this path.
        Ok(build_position(
            &record,
            &data,
            chain,
            Some(price),
            SnapshotDate::today(),
            block.unwrap_or(0),
        ))
    }
}

/// Convert one raw share record into a valued snapshot entity.
///
/// Returns `None` for zero-supply vaults: there is no valid
/// share-to-asset conversion, so the position is skipped, never zeroed.
/// A missing price values the position at 0.
fn build_position(
    record: &RawPositionRecord,
    data: &VaultStaticData,
    chain: Chain,
    price: Option<f64>,
    date: SnapshotDate,
    block: u64,
) -> Option<VaultPosition> {
    if data.total_supply.is_zero() {
        return None;
    }

    let assets = math::convert_shares_to_assets(record.shares, data.total_assets, data.total_supply);
    let balance = math::format_units(assets, data.asset_decimals);
    let usd_value = price.map(|p| math::usd_value(&balance, p)).unwrap_or(0.0);

    Some(VaultPosition {
        wallet_address: record.account.clone(),
        vault_address: data.vault_address.clone(),
        asset_symbol: data.asset_symbol.clone(),
        chain,
        balance,
        shares: record.shares.to_string(),
        usd_value,
        lock_weeks_remaining: 0,
        snapshot_date: date,
        block_number: block as i64,
        created_at: Utc::now().timestamp_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use std::str::FromStr;

    fn record(account: &str, shares: &str) -> RawPositionRecord {
        RawPositionRecord {
            vault_address: Address::new("0xvault"),
            account: Address::new(account),
            shares: U256::from_str(shares).unwrap(),
            last_updated: None,
        }
    }

    fn vault(total_assets: &str, total_supply: &str) -> VaultStaticData {
        VaultStaticData {
            vault_address: Address::new("0xvault"),
            total_assets: U256::from_str(total_assets).unwrap(),
            total_supply: U256::from_str(total_supply).unwrap(),
            asset_address: Address::new("0xasset"),
            asset_symbol: "ETH".to_string(),
            asset_decimals: 18,
        }
    }

    #[test]
    fn test_build_position_values_balance() {
        let data = vault("1000000000000000000000", "900000000000000000000");
        let position = build_position(
            &record("0xWALLET123", "100000000000000000000"),
            &data,
            Chain::Base,
            Some(3000.0),
            "2024-03-15".parse().unwrap(),
            123456,
        )
        .expect("position expected");

        assert_eq!(position.wallet_address.as_str(), "0xwallet123");
        assert_eq!(position.balance, "111.111111111111111111");
        assert_eq!(position.shares, "100000000000000000000");
        assert!((position.usd_value - 333333.333333).abs() < 0.01);
        assert_eq!(position.block_number, 123456);
    }

    #[test]
    fn test_build_position_zero_supply_is_skipped() {
        let data = vault("1000000000000000000000", "0");
        assert!(build_position(
            &record("0xwallet", "100"),
            &data,
            Chain::Base,
            Some(3000.0),
            "2024-03-15".parse().unwrap(),
            1,
        )
        .is_none());
    }

    #[test]
    fn test_build_position_missing_price_is_zero_usd() {
        let data = vault("1000", "1000");
        let position = build_position(
            &record("0xwallet", "500"),
            &data,
            Chain::Base,
            None,
            "2024-03-15".parse().unwrap(),
            1,
        )
        .expect("position expected");
        assert_eq!(position.usd_value, 0.0);
        assert_eq!(position.balance, "0.0000000000000005");
    }
}
