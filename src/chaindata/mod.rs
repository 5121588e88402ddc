//! Chain data abstraction for vault discovery, share balances, and
//! block resolution.

use crate::domain::{Address, Chain, RawPositionRecord, VaultStaticData};
use async_trait::async_trait;
use thiserror::Error;

pub mod abi;
pub mod mock;
pub mod rpc;
pub mod rpc_client;
pub mod subgraph;

pub use mock::MockChainProvider;
pub use rpc::RpcProvider;
pub use rpc_client::RpcClient;
pub use subgraph::SubgraphProvider;

/// Underlying-asset symbols eligible for reward accrual.
pub const ELIGIBLE_ASSET_SYMBOLS: [&str; 6] = ["ETH", "WETH", "USDC", "USDT", "DAI", "WBTC"];

/// Chain data provider over vault discovery, static data, share
/// balances, and timestamp→block resolution.
///
/// Two interchangeable implementations exist: [`SubgraphProvider`]
/// (graph-indexed) and [`RpcProvider`] (direct contract calls). The sync
/// orchestrator is agnostic to which is wired in.
///
/// Failure policy: upstream errors surface as [`ProviderError`] without
/// internal retries; retry is the orchestrator/queue's responsibility.
#[async_trait]
pub trait ChainDataProvider: Send + Sync + std::fmt::Debug {
    /// Addresses of vaults eligible for reward accrual on a chain.
    ///
    /// An empty list means "nothing to sync for this chain", not an error.
    async fn eligible_vaults(&self, chain: Chain) -> Result<Vec<Address>, ProviderError>;

    /// Static data for a vault, or `None` when the vault cannot be
    /// resolved — callers skip, not fail, such vaults.
    async fn vault_data(
        &self,
        vault: &Address,
        chain: Chain,
    ) -> Result<Option<VaultStaticData>, ProviderError>;

    /// All non-zero share balances held in a vault, optionally pinned to
    /// a block so reads within one snapshot are self-consistent.
    async fn vault_positions(
        &self,
        vault: &Address,
        chain: Chain,
        block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError>;

    /// All non-zero share balances a wallet holds across eligible
    /// vaults. `None` block reads at latest.
    async fn user_vault_positions(
        &self,
        wallet: &Address,
        chain: Chain,
        block: Option<u64>,
    ) -> Result<Vec<RawPositionRecord>, ProviderError>;

    /// Earliest block whose timestamp is >= the given unix timestamp.
    async fn block_by_timestamp(&self, chain: Chain, timestamp: i64) -> Result<u64, ProviderError>;
}

/// Error type for chain data operations. Never retried internally.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure reaching the upstream.
    #[error("provider network error: {0}")]
    Network(String),
    /// Upstream returned an unexpected HTTP status.
    #[error("provider HTTP {status}")]
    Http { status: u16 },
    /// Upstream returned a body we could not interpret.
    #[error("malformed provider response: {0}")]
    Malformed(String),
    /// JSON-RPC level error from the node.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// No endpoint configured for this chain.
    #[error("chain not configured: {0}")]
    UnsupportedChain(Chain),
    /// A block lookup failed mid block-resolution; the whole resolution
    /// fails rather than returning a stale answer.
    #[error("block {0} not available")]
    BlockLookup(u64),
}
