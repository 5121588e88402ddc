//! Price oracle abstraction for resolving token symbols to USD prices.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

pub mod coingecko;
pub mod mock;

pub use coingecko::CoinGeckoOracle;
pub use mock::MockPriceOracle;

/// Price oracle over spot and historical USD prices.
///
/// Single-symbol reads fail fast with [`PriceError::PriceUnavailable`]
/// when no price exists; batched reads tolerate per-symbol misses by
/// omitting the symbol from the result map, and callers treat absence as
/// "unknown price" (valuing to 0) rather than an error.
#[async_trait]
pub trait PriceOracle: Send + Sync + std::fmt::Debug {
    /// Current USD price for a token symbol.
    async fn token_price(&self, symbol: &str) -> Result<f64, PriceError>;

    /// Current USD prices for several symbols in one upstream call.
    ///
    /// Symbols the provider cannot price are omitted from the map.
    async fn multiple_token_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>, PriceError>;

    /// USD price for a token symbol on a specific date.
    async fn historical_price(&self, symbol: &str, date: NaiveDate) -> Result<f64, PriceError>;
}

/// Error type for price oracle operations. Never retried internally.
#[derive(Debug, Error)]
pub enum PriceError {
    /// The provider has no price for this symbol (at the requested time).
    #[error("no price available for {symbol}")]
    PriceUnavailable { symbol: String },
    /// Upstream transport failure.
    #[error("price provider network error: {0}")]
    Network(String),
    /// Upstream returned an unexpected status.
    #[error("price provider HTTP {status}")]
    Http { status: u16 },
    /// Upstream returned a body we could not interpret.
    #[error("malformed price response: {0}")]
    Malformed(String),
}
