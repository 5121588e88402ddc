use std::sync::Arc;
use vaultsync::sync::run_worker;
use vaultsync::{
    init_db, ChainDataProvider, CoinGeckoOracle, Config, InProcessQueue, PriceOracle,
    ProviderKind, RetryPolicy, RpcClient, RpcProvider, Scheduler, SnapshotStore,
    SqliteSnapshotStore, SubgraphProvider, TaskQueue, VaultSyncService,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize the snapshot store
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    let store: Arc<dyn SnapshotStore> = Arc::new(SqliteSnapshotStore::new(pool));

    // Wire the configured chain data provider variant
    let rpc = Arc::new(RpcClient::new(
        config.rpc_endpoints(),
        config.block_cache_ttl,
    ));
    let provider: Arc<dyn ChainDataProvider> = match config.provider_kind {
        ProviderKind::Subgraph => Arc::new(SubgraphProvider::new(
            config.subgraph_endpoints(),
            rpc,
            config.provider_cache_ttl,
        )),
        ProviderKind::Rpc => Arc::new(RpcProvider::new(
            rpc,
            config.eligible_vaults(),
            config.provider_cache_ttl,
            config.transfer_lookback_blocks,
        )),
    };

    let oracle: Arc<dyn PriceOracle> = Arc::new(CoinGeckoOracle::new(
        config.coingecko_api_url.clone(),
        config.coingecko_api_key.clone(),
        config.price_cache_ttl,
    ));

    let (queue, queue_rx) = InProcessQueue::new();
    let queue: Arc<dyn TaskQueue> = Arc::new(queue);

    let service = Arc::new(VaultSyncService::new(provider, oracle, store, queue));

    // Per-vault tasks drain on a dedicated worker with bounded retries
    tokio::spawn(run_worker(
        queue_rx,
        service.clone(),
        RetryPolicy::default(),
    ));

    tracing::info!(
        chains = config.chains.len(),
        sync_hour_utc = config.sync_hour_utc,
        "vault sync service started"
    );

    Scheduler::new(service, config.sync_hour_utc).run().await;
}
