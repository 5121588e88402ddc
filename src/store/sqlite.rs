//! SQLite-backed snapshot store.

use crate::domain::{Address, Chain, SnapshotDate, VaultPosition};
use crate::store::{SnapshotStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{info, warn};

/// Snapshot store over a SQLite connection pool.
#[derive(Debug)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Create a store over an initialized pool (see [`crate::store::init_db`]).
    pub fn new(pool: SqlitePool) -> Self {
        SqliteSnapshotStore { pool }
    }
}

const UPSERT_SQL: &str = r#"
    INSERT INTO vault_positions (
        wallet_address, vault_address, asset_symbol, chain, balance,
        shares, usd_value, lock_weeks_remaining, snapshot_date,
        block_number, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(wallet_address, vault_address, chain, snapshot_date) DO UPDATE SET
        asset_symbol = excluded.asset_symbol,
        balance = excluded.balance,
        shares = excluded.shares,
        usd_value = excluded.usd_value,
        lock_weeks_remaining = excluded.lock_weeks_remaining,
        block_number = excluded.block_number
"#;

fn bind_position<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    position: &'q VaultPosition,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(position.wallet_address.as_str())
        .bind(position.vault_address.as_str())
        .bind(position.asset_symbol.as_str())
        .bind(position.chain.as_str())
        .bind(position.balance.as_str())
        .bind(position.shares.as_str())
        .bind(position.usd_value)
        .bind(position.lock_weeks_remaining)
        .bind(position.snapshot_date.to_string())
        .bind(position.block_number)
        .bind(position.created_at)
}

fn row_to_position(row: &SqliteRow) -> Result<VaultPosition, StoreError> {
    let chain_str: String = row.get("chain");
    let chain: Chain = chain_str
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("bad chain column: {}", chain_str)))?;
    let date_str: String = row.get("snapshot_date");
    let snapshot_date: SnapshotDate = date_str
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("bad snapshot_date column: {}", date_str)))?;

    Ok(VaultPosition {
        wallet_address: Address::new(row.get::<String, _>("wallet_address")),
        vault_address: Address::new(row.get::<String, _>("vault_address")),
        asset_symbol: row.get("asset_symbol"),
        chain,
        balance: row.get("balance"),
        shares: row.get("shares"),
        usd_value: row.get("usd_value"),
        lock_weeks_remaining: row.get("lock_weeks_remaining"),
        snapshot_date,
        block_number: row.get("block_number"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn delete_by_date_and_chain(
        &self,
        date: SnapshotDate,
        chain: Chain,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM vault_positions WHERE snapshot_date = ? AND chain = ?",
        )
        .bind(date.to_string())
        .bind(chain.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn create_batch(&self, positions: &[VaultPosition]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for position in positions {
            let result = bind_position(sqlx::query(UPSERT_SQL), position)
                .execute(&mut *tx)
                .await;
            match result {
                Ok(r) => written += r.rows_affected(),
                Err(e) => {
                    // Roll back rather than silently persisting a
                    // partial batch.
                    warn!(
                        wallet = %position.wallet_address,
                        vault = %position.vault_address,
                        written,
                        "batch insert failed mid-way, rolling back: {}",
                        e
                    );
                    tx.rollback().await?;
                    return Err(e.into());
                }
            }
        }

        tx.commit().await?;
        info!(count = positions.len(), "persisted snapshot batch");
        Ok(())
    }

    async fn upsert(&self, position: &VaultPosition) -> Result<VaultPosition, StoreError> {
        bind_position(sqlx::query(UPSERT_SQL), position)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query(
            r#"
            SELECT wallet_address, vault_address, asset_symbol, chain, balance,
                   shares, usd_value, lock_weeks_remaining, snapshot_date,
                   block_number, created_at
            FROM vault_positions
            WHERE wallet_address = ? AND vault_address = ? AND chain = ? AND snapshot_date = ?
            "#,
        )
        .bind(position.wallet_address.as_str())
        .bind(position.vault_address.as_str())
        .bind(position.chain.as_str())
        .bind(position.snapshot_date.to_string())
        .fetch_one(&self.pool)
        .await?;

        row_to_position(&row)
    }

    async fn find_by_wallet_and_date(
        &self,
        wallet: &Address,
        date: SnapshotDate,
    ) -> Result<Vec<VaultPosition>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT wallet_address, vault_address, asset_symbol, chain, balance,
                   shares, usd_value, lock_weeks_remaining, snapshot_date,
                   block_number, created_at
            FROM vault_positions
            WHERE wallet_address = ? AND snapshot_date = ?
            ORDER BY chain ASC, vault_address ASC
            "#,
        )
        .bind(wallet.as_str())
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::init_db;
    use tempfile::TempDir;

    async fn setup_store() -> (SqliteSnapshotStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (SqliteSnapshotStore::new(pool), temp_dir)
    }

    fn make_position(wallet: &str, vault: &str, chain: Chain, date: &str) -> VaultPosition {
        VaultPosition {
            wallet_address: Address::new(wallet),
            vault_address: Address::new(vault),
            asset_symbol: "WETH".to_string(),
            chain,
            balance: "111.111111111111111111".to_string(),
            shares: "100000000000000000000".to_string(),
            usd_value: 333333.33,
            lock_weeks_remaining: 0,
            snapshot_date: date.parse().unwrap(),
            block_number: 123456,
            created_at: 1710500000000,
        }
    }

    #[tokio::test]
    async fn test_create_batch_and_find() {
        let (store, _temp) = setup_store().await;
        let positions = vec![
            make_position("0xwallet1", "0xvault1", Chain::Base, "2024-03-15"),
            make_position("0xwallet1", "0xvault2", Chain::Base, "2024-03-15"),
            make_position("0xwallet2", "0xvault1", Chain::Base, "2024-03-15"),
        ];

        store.create_batch(&positions).await.expect("batch failed");

        let found = store
            .find_by_wallet_and_date(&Address::new("0xwallet1"), "2024-03-15".parse().unwrap())
            .await
            .expect("find failed");
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_find_is_case_insensitive_via_normalization() {
        let (store, _temp) = setup_store().await;
        store
            .create_batch(&[make_position(
                "0xWALLET1",
                "0xVAULT1",
                Chain::Base,
                "2024-03-15",
            )])
            .await
            .unwrap();

        let found = store
            .find_by_wallet_and_date(&Address::new("0xWallet1"), "2024-03-15".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vault_address.as_str(), "0xvault1");
    }

    #[tokio::test]
    async fn test_delete_by_date_and_chain_counts_rows() {
        let (store, _temp) = setup_store().await;
        store
            .create_batch(&[
                make_position("0xw1", "0xv1", Chain::Base, "2024-03-15"),
                make_position("0xw2", "0xv1", Chain::Base, "2024-03-15"),
                make_position("0xw1", "0xv1", Chain::Ethereum, "2024-03-15"),
                make_position("0xw1", "0xv1", Chain::Base, "2024-03-16"),
            ])
            .await
            .unwrap();

        let deleted = store
            .delete_by_date_and_chain("2024-03-15".parse().unwrap(), Chain::Base)
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        // Other chain and other date untouched.
        let remaining = store
            .find_by_wallet_and_date(&Address::new("0xw1"), "2024-03-15".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].chain, Chain::Ethereum);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_natural_key() {
        let (store, _temp) = setup_store().await;
        let mut position = make_position("0xw1", "0xv1", Chain::Base, "2024-03-15");
        store.upsert(&position).await.unwrap();

        position.usd_value = 5000.0;
        position.balance = "2".to_string();
        let updated = store.upsert(&position).await.unwrap();
        assert_eq!(updated.usd_value, 5000.0);
        assert_eq!(updated.balance, "2");

        let found = store
            .find_by_wallet_and_date(&Address::new("0xw1"), "2024-03-15".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(found.len(), 1, "upsert must not duplicate");
    }

    #[tokio::test]
    async fn test_batch_is_retry_safe() {
        let (store, _temp) = setup_store().await;
        let positions = vec![make_position("0xw1", "0xv1", Chain::Base, "2024-03-15")];
        store.create_batch(&positions).await.unwrap();
        store.create_batch(&positions).await.unwrap();

        let found = store
            .find_by_wallet_and_date(&Address::new("0xw1"), "2024-03-15".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
