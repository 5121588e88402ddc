//! Vault position snapshot entity and transient provider records.

use crate::domain::{Address, Chain, SnapshotDate};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// One wallet's valued stake in one vault at one point in time.
///
/// Natural key: (wallet_address, vault_address, chain, snapshot_date).
/// `balance` and `shares` are decimal strings to preserve arbitrary
/// precision; `usd_value` is informational display precision only and is
/// never fed back into share/asset math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultPosition {
    pub wallet_address: Address,
    pub vault_address: Address,
    /// Uppercase ticker of the vault's underlying asset.
    pub asset_symbol: String,
    pub chain: Chain,
    /// Underlying-asset balance as a human-readable decimal string.
    pub balance: String,
    /// Raw vault-share count as an integer decimal string.
    pub shares: String,
    pub usd_value: f64,
    pub lock_weeks_remaining: i64,
    pub snapshot_date: SnapshotDate,
    /// Chain block the snapshot was read at (0 when read at latest).
    pub block_number: i64,
    /// Unix millis at entity construction.
    pub created_at: i64,
}

/// Per-vault descriptive data, fetched fresh each sync and cached
/// short-term by the chain data provider. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStaticData {
    pub vault_address: Address,
    pub total_assets: U256,
    pub total_supply: U256,
    pub asset_address: Address,
    /// Uppercase ticker, e.g. "WETH".
    pub asset_symbol: String,
    pub asset_decimals: u8,
}

/// Raw share-balance record from a chain data provider.
///
/// Transient: consumed immediately by the orchestrator and either
/// converted into a [`VaultPosition`] or discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPositionRecord {
    pub vault_address: Address,
    pub account: Address,
    pub shares: U256,
    /// Unix seconds of the record's last index update, when known.
    pub last_updated: Option<i64>,
}
