pub mod cache;
pub mod chaindata;
pub mod config;
pub mod domain;
pub mod pricing;
pub mod store;
pub mod sync;

pub use cache::TtlCache;
pub use chaindata::{
    ChainDataProvider, MockChainProvider, ProviderError, RpcClient, RpcProvider, SubgraphProvider,
};
pub use config::{Config, ProviderKind};
pub use domain::{Address, Chain, RawPositionRecord, SnapshotDate, VaultPosition, VaultStaticData};
pub use pricing::{CoinGeckoOracle, MockPriceOracle, PriceError, PriceOracle};
pub use store::{init_db, MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore, StoreError};
pub use sync::{
    InProcessQueue, RetryPolicy, Scheduler, SyncError, TaskQueue, VaultSyncJob, VaultSyncService,
};
