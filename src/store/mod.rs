//! Snapshot store for point-in-time vault positions.

use crate::domain::{Address, Chain, SnapshotDate, VaultPosition};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemorySnapshotStore;
pub use migrations::init_db;
pub use sqlite::SqliteSnapshotStore;

/// Persistence contract for vault position snapshots.
///
/// Rows are keyed by the natural key (wallet_address, vault_address,
/// chain, snapshot_date); batch creation relies on a store-assigned
/// synthetic id.
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Delete all snapshots for a (date, chain); returns the row count.
    async fn delete_by_date_and_chain(
        &self,
        date: SnapshotDate,
        chain: Chain,
    ) -> Result<u64, StoreError>;

    /// Persist a batch of snapshots in one call.
    ///
    /// Not required to be atomic, but a partial apply is logged, never
    /// silent.
    async fn create_batch(&self, positions: &[VaultPosition]) -> Result<(), StoreError>;

    /// Insert or update one snapshot by its natural key.
    async fn upsert(&self, position: &VaultPosition) -> Result<VaultPosition, StoreError>;

    /// All snapshots for a wallet on a date, across chains.
    async fn find_by_wallet_and_date(
        &self,
        wallet: &Address,
        date: SnapshotDate,
    ) -> Result<Vec<VaultPosition>, StoreError>;
}

/// Error type for snapshot store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("corrupt snapshot row: {0}")]
    Corrupt(String),
}
