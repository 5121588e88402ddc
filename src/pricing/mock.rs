//! Mock price oracle for testing without network calls.

use super::{PriceError, PriceOracle};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Mock price oracle backed by a fixed symbol→price map.
///
/// Symbols without a price are omitted from batched results and fail
/// single reads with `PriceUnavailable`, matching the real oracle's
/// partial-failure contract.
#[derive(Debug, Clone, Default)]
pub struct MockPriceOracle {
    prices: HashMap<String, f64>,
    fail_all: bool,
}

impl MockPriceOracle {
    /// Create a mock with no prices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price for a symbol (case-insensitive).
    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_lowercase(), price);
        self
    }

    /// Make every call fail with a network error.
    pub fn failing() -> Self {
        Self {
            prices: HashMap::new(),
            fail_all: true,
        }
    }

    fn lookup(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&symbol.to_lowercase()).copied()
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn token_price(&self, symbol: &str) -> Result<f64, PriceError> {
        if self.fail_all {
            return Err(PriceError::Network("mock failure".to_string()));
        }
        self.lookup(symbol)
            .ok_or_else(|| PriceError::PriceUnavailable {
                symbol: symbol.to_string(),
            })
    }

    async fn multiple_token_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>, PriceError> {
        if self.fail_all {
            return Err(PriceError::Network("mock failure".to_string()));
        }
        Ok(symbols
            .iter()
            .filter_map(|s| self.lookup(s).map(|p| (s.clone(), p)))
            .collect())
    }

    async fn historical_price(&self, symbol: &str, _date: NaiveDate) -> Result<f64, PriceError> {
        self.token_price(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_price_lookup() {
        let oracle = MockPriceOracle::new().with_price("ETH", 3000.0);
        assert_eq!(oracle.token_price("eth").await.unwrap(), 3000.0);
        assert!(matches!(
            oracle.token_price("DOGE").await,
            Err(PriceError::PriceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_batch_omits_unknown_symbols() {
        let oracle = MockPriceOracle::new().with_price("ETH", 3000.0);
        let prices = oracle
            .multiple_token_prices(&["ETH".to_string(), "DOGE".to_string()])
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("ETH"), Some(&3000.0));
        assert!(!prices.contains_key("DOGE"));
    }
}
