//! CoinGecko price oracle client.

use super::{PriceError, PriceOracle};
use crate::cache::TtlCache;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// CoinGecko-backed price oracle with a cache-first policy.
///
/// Lookups are fail-fast: a miss from the upstream API surfaces as
/// [`PriceError`] immediately, and retry is left to the caller's queue.
#[derive(Debug)]
pub struct CoinGeckoOracle {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    cache: TtlCache<String, f64>,
}

impl CoinGeckoOracle {
    /// Create an oracle against the given API base URL.
    pub fn new(api_url: String, api_key: Option<String>, cache_ttl: Duration) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Map a token symbol to its CoinGecko coin id.
    ///
    /// Unmapped symbols fall back to the lowercased symbol, which works
    /// for coins whose id matches their ticker.
    fn coin_id(symbol: &str) -> String {
        match symbol.to_uppercase().as_str() {
            "ETH" | "WETH" => "ethereum".to_string(),
            "BTC" => "bitcoin".to_string(),
            "WBTC" => "wrapped-bitcoin".to_string(),
            "USDC" => "usd-coin".to_string(),
            "USDT" => "tether".to_string(),
            "DAI" => "dai".to_string(),
            other => {
                let id = other.to_lowercase();
                warn!(symbol = other, id = %id, "no coingecko id mapping, falling back to symbol");
                id
            }
        }
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, PriceError> {
        let url = format!("{}/{}", self.api_url, path);
        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PriceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PriceError::Malformed(e.to_string()))
    }

    fn cache_key(symbol: &str) -> String {
        symbol.to_lowercase()
    }

    fn historical_cache_key(symbol: &str, date: NaiveDate) -> String {
        format!("{}:{}", symbol.to_lowercase(), date.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoOracle {
    async fn token_price(&self, symbol: &str) -> Result<f64, PriceError> {
        let key = Self::cache_key(symbol);
        if let Some(price) = self.cache.get(&key).await {
            return Ok(price);
        }

        let id = Self::coin_id(symbol);
        let body = self
            .get_json("simple/price", &[("ids", id.as_str()), ("vs_currencies", "usd")])
            .await?;

        let price = body
            .get(&id)
            .and_then(|entry| entry.get("usd"))
            .and_then(|value| value.as_f64())
            .ok_or_else(|| PriceError::PriceUnavailable {
                symbol: symbol.to_string(),
            })?;

        self.cache.insert(key, price).await;
        Ok(price)
    }

    async fn multiple_token_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>, PriceError> {
        let mut prices = HashMap::new();
        let mut uncached: Vec<&String> = Vec::new();

        for symbol in symbols {
            match self.cache.get(&Self::cache_key(symbol)).await {
                Some(price) => {
                    prices.insert(symbol.clone(), price);
                }
                None => uncached.push(symbol),
            }
        }

        if uncached.is_empty() {
            return Ok(prices);
        }

        let mut ids: Vec<String> = uncached.iter().map(|s| Self::coin_id(s)).collect();
        ids.sort();
        ids.dedup();
        let ids_param = ids.join(",");

        let body = self
            .get_json(
                "simple/price",
                &[("ids", ids_param.as_str()), ("vs_currencies", "usd")],
            )
            .await?;

        for symbol in uncached {
            let id = Self::coin_id(symbol);
            match body
                .get(&id)
                .and_then(|entry| entry.get("usd"))
                .and_then(|value| value.as_f64())
            {
                Some(price) => {
                    self.cache.insert(Self::cache_key(symbol), price).await;
                    prices.insert(symbol.clone(), price);
                }
                None => {
                    // Tolerated partial failure: callers value the symbol at 0.
                    debug!(symbol = %symbol, "price missing from batched response");
                }
            }
        }

        Ok(prices)
    }

    async fn historical_price(&self, symbol: &str, date: NaiveDate) -> Result<f64, PriceError> {
        let key = Self::historical_cache_key(symbol, date);
        if let Some(price) = self.cache.get(&key).await {
            return Ok(price);
        }

        let id = Self::coin_id(symbol);
        // CoinGecko's history endpoint wants dd-mm-yyyy.
        let date_param = date.format("%d-%m-%Y").to_string();
        let body = self
            .get_json(
                &format!("coins/{}/history", id),
                &[("date", date_param.as_str()), ("localization", "false")],
            )
            .await?;

        let price = body
            .get("market_data")
            .and_then(|m| m.get("current_price"))
            .and_then(|p| p.get("usd"))
            .and_then(|value| value.as_f64())
            .ok_or_else(|| PriceError::PriceUnavailable {
                symbol: symbol.to_string(),
            })?;

        self.cache.insert(key, price).await;
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_id_mapping() {
        assert_eq!(CoinGeckoOracle::coin_id("ETH"), "ethereum");
        assert_eq!(CoinGeckoOracle::coin_id("weth"), "ethereum");
        assert_eq!(CoinGeckoOracle::coin_id("WBTC"), "wrapped-bitcoin");
        assert_eq!(CoinGeckoOracle::coin_id("USDC"), "usd-coin");
        assert_eq!(CoinGeckoOracle::coin_id("USDT"), "tether");
        assert_eq!(CoinGeckoOracle::coin_id("DAI"), "dai");
    }

    #[test]
    fn test_coin_id_fallback_is_lowercased_symbol() {
        assert_eq!(CoinGeckoOracle::coin_id("SHARD"), "shard");
    }

    #[test]
    fn test_historical_cache_key_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            CoinGeckoOracle::historical_cache_key("ETH", date),
            "eth:2024-03-15"
        );
    }

    #[tokio::test]
    async fn test_cached_price_skips_network() {
        // Unroutable URL: any network attempt would error, so a hit
        // proves the cache short-circuits.
        let oracle = CoinGeckoOracle::new(
            "http://127.0.0.1:1".to_string(),
            None,
            Duration::from_secs(60),
        );
        oracle.cache.insert("eth".to_string(), 3000.0).await;

        let price = oracle.token_price("ETH").await.unwrap();
        assert_eq!(price, 3000.0);
    }

    #[tokio::test]
    async fn test_batch_all_cached_skips_network() {
        let oracle = CoinGeckoOracle::new(
            "http://127.0.0.1:1".to_string(),
            None,
            Duration::from_secs(60),
        );
        oracle.cache.insert("eth".to_string(), 3000.0).await;
        oracle.cache.insert("usdc".to_string(), 1.0).await;

        let prices = oracle
            .multiple_token_prices(&["ETH".to_string(), "USDC".to_string()])
            .await
            .unwrap();
        assert_eq!(prices.get("ETH"), Some(&3000.0));
        assert_eq!(prices.get("USDC"), Some(&1.0));
    }

    #[tokio::test]
    async fn test_network_failure_surfaces() {
        let oracle = CoinGeckoOracle::new(
            "http://127.0.0.1:1".to_string(),
            None,
            Duration::from_secs(60),
        );
        let err = oracle.token_price("ETH").await.unwrap_err();
        assert!(matches!(err, PriceError::Network(_)));
    }
}
