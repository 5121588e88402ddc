//! In-memory snapshot store for tests where a database is overkill.

use crate::domain::{Address, Chain, SnapshotDate, VaultPosition};
use crate::store::{SnapshotStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type NaturalKey = (String, String, Chain, SnapshotDate);

/// Snapshot store over a locked map, keyed by the natural key.
///
/// Tracks call counts so tests can assert on interaction shape (e.g.
/// the empty-vaults short-circuit never touching the purge).
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    rows: Mutex<HashMap<NaturalKey, VaultPosition>>,
    delete_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(position: &VaultPosition) -> NaturalKey {
        (
            position.wallet_address.as_str().to_string(),
            position.vault_address.as_str().to_string(),
            position.chain,
            position.snapshot_date,
        )
    }

    /// Number of delete_by_date_and_chain calls observed.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of create_batch calls observed.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// All stored rows, for direct assertions.
    pub fn all(&self) -> Vec<VaultPosition> {
        let rows = self.rows.lock().expect("store lock poisoned");
        let mut all: Vec<VaultPosition> = rows.values().cloned().collect();
        all.sort_by(|a, b| Self::key(a).cmp(&Self::key(b)));
        all
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn delete_by_date_and_chain(
        &self,
        date: SnapshotDate,
        chain: Chain,
    ) -> Result<u64, StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().expect("store lock poisoned");
        let before = rows.len();
        rows.retain(|(_, _, c, d), _| !(*c == chain && *d == date));
        Ok((before - rows.len()) as u64)
    }

    async fn create_batch(&self, positions: &[VaultPosition]) -> Result<(), StoreError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().expect("store lock poisoned");
        for position in positions {
            rows.insert(Self::key(position), position.clone());
        }
        Ok(())
    }

    async fn upsert(&self, position: &VaultPosition) -> Result<VaultPosition, StoreError> {
        let mut rows = self.rows.lock().expect("store lock poisoned");
        rows.insert(Self::key(position), position.clone());
        Ok(position.clone())
    }

    async fn find_by_wallet_and_date(
        &self,
        wallet: &Address,
        date: SnapshotDate,
    ) -> Result<Vec<VaultPosition>, StoreError> {
        let rows = self.rows.lock().expect("store lock poisoned");
        let mut found: Vec<VaultPosition> = rows
            .values()
            .filter(|p| p.wallet_address == *wallet && p.snapshot_date == date)
            .cloned()
            .collect();
        found.sort_by(|a, b| Self::key(a).cmp(&Self::key(b)));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_position(wallet: &str, vault: &str, date: &str) -> VaultPosition {
        VaultPosition {
            wallet_address: Address::new(wallet),
            vault_address: Address::new(vault),
            asset_symbol: "USDC".to_string(),
            chain: Chain::Base,
            balance: "100".to_string(),
            shares: "100000000".to_string(),
            usd_value: 100.0,
            lock_weeks_remaining: 0,
            snapshot_date: date.parse().unwrap(),
            block_number: 1,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        store
            .create_batch(&[
                make_position("0xw1", "0xv1", "2024-03-15"),
                make_position("0xw1", "0xv2", "2024-03-15"),
            ])
            .await
            .unwrap();

        let found = store
            .find_by_wallet_and_date(&Address::new("0xW1"), "2024-03-15".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_delete_scoped_to_date_and_chain() {
        let store = MemorySnapshotStore::new();
        store
            .create_batch(&[
                make_position("0xw1", "0xv1", "2024-03-15"),
                make_position("0xw1", "0xv1", "2024-03-16"),
            ])
            .await
            .unwrap();

        let deleted = store
            .delete_by_date_and_chain("2024-03-15".parse().unwrap(), Chain::Base)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.delete_calls(), 1);
    }
}
