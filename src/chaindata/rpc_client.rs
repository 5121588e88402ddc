//! Low-level JSON-RPC client shared by both chain data providers.

use crate::cache::TtlCache;
use crate::chaindata::ProviderError;
use crate::domain::Chain;
use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// JSON-RPC client over per-chain HTTP endpoints.
///
/// Carries the timestamp→block cache: historical block-timestamp
/// mappings never change once finalized, so resolved blocks are cached
/// with a long TTL.
#[derive(Debug)]
pub struct RpcClient {
    client: Client,
    endpoints: HashMap<Chain, String>,
    block_cache: TtlCache<(Chain, i64), u64>,
}

impl RpcClient {
    /// Create a client over the given per-chain endpoints.
    pub fn new(endpoints: HashMap<Chain, String>, block_cache_ttl: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            block_cache: TtlCache::new(block_cache_ttl),
        }
    }

    fn endpoint(&self, chain: Chain) -> Result<&str, ProviderError> {
        self.endpoints
            .get(&chain)
            .map(|s| s.as_str())
            .ok_or(ProviderError::UnsupportedChain(chain))
    }

    /// Issue a raw JSON-RPC call and return its `result`.
    async fn call(&self, chain: Chain, method: &str, params: Value) -> Result<Value, ProviderError> {
        let url = self.endpoint(chain)?;
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(error) = body.get("error") {
            return Err(ProviderError::Rpc {
                code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| ProviderError::Malformed("missing result field".to_string()))
    }

    /// `eth_call` against a contract, pinned to a block when given.
    ///
    /// Returns `None` when the node reports an execution-level error
    /// (revert, selector missing) — contract ABI variance is a skip for
    /// callers, not a failure. Transport errors still propagate.
    pub async fn eth_call(
        &self,
        chain: Chain,
        to: &str,
        data: &str,
        block: Option<u64>,
    ) -> Result<Option<Vec<u8>>, ProviderError> {
        let block_tag = block
            .map(|b| format!("0x{:x}", b))
            .unwrap_or_else(|| "latest".to_string());
        let params = json!([{ "to": to, "data": data }, block_tag]);

        match self.call(chain, "eth_call", params).await {
            Ok(result) => {
                let data = result
                    .as_str()
                    .ok_or_else(|| ProviderError::Malformed("eth_call result not hex".to_string()))?;
                if data == "0x" {
                    return Ok(None);
                }
                crate::chaindata::abi::decode_hex(data).map(Some)
            }
            Err(ProviderError::Rpc { code, message }) => {
                debug!(code, message = %message, to, "eth_call rejected by node");
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Current head block number.
    pub async fn head_block(&self, chain: Chain) -> Result<u64, ProviderError> {
        let result = self.call(chain, "eth_blockNumber", json!([])).await?;
        parse_hex_u64(&result)
    }

    /// Timestamp of a block by number. A missing block is a hard error,
    /// so mid-search failures abort block resolution entirely.
    pub async fn block_timestamp(&self, chain: Chain, number: u64) -> Result<i64, ProviderError> {
        let params = json!([format!("0x{:x}", number), false]);
        let result = self.call(chain, "eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return Err(ProviderError::BlockLookup(number));
        }
        let ts = result
            .get("timestamp")
            .ok_or(ProviderError::BlockLookup(number))?;
        parse_hex_u64(ts).map(|v| v as i64)
    }

    /// Earliest block whose timestamp is >= `timestamp`, by binary
    /// search over `[0, head]`. Cached per (chain, timestamp).
    pub async fn block_by_timestamp(
        &self,
        chain: Chain,
        timestamp: i64,
    ) -> Result<u64, ProviderError> {
        if let Some(block) = self.block_cache.get(&(chain, timestamp)).await {
            return Ok(block);
        }

        let head = self.head_block(chain).await?;
        let block = search_earliest_block(head, timestamp, move |n| {
            Box::pin(self.block_timestamp(chain, n))
        })
        .await?;

        debug!(%chain, timestamp, block, "resolved block for timestamp");
        self.block_cache.insert((chain, timestamp), block).await;
        Ok(block)
    }

    /// `eth_getLogs` for one address + topic0 over a block range.
    pub async fn get_logs(
        &self,
        chain: Chain,
        address: &str,
        topic0: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Value>, ProviderError> {
        let params = json!([{
            "address": address,
            "topics": [topic0],
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        }]);
        let result = self.call(chain, "eth_getLogs", params).await?;
        result
            .as_array()
            .cloned()
            .ok_or_else(|| ProviderError::Malformed("eth_getLogs result not an array".to_string()))
    }
}

/// Binary search for the earliest block whose timestamp is >= `target`.
///
/// Each step's comparison depends on the previous one, so lookups are
/// inherently sequential; a failed lookup fails the whole search rather
/// than converging on a wrong block.
pub(crate) async fn search_earliest_block<'a, F>(
    head: u64,
    target: i64,
    lookup: F,
) -> Result<u64, ProviderError>
where
    F: Fn(u64) -> BoxFuture<'a, Result<i64, ProviderError>>,
{
    let mut lo = 0u64;
    let mut hi = head;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let ts = lookup(mid).await?;
        if ts < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

fn parse_hex_u64(value: &Value) -> Result<u64, ProviderError> {
    let s = value
        .as_str()
        .ok_or_else(|| ProviderError::Malformed("expected hex quantity string".to_string()))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ProviderError::Malformed(format!("invalid hex quantity {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Synthetic monotonic series: block n has timestamp 1000 + n * 12.
    fn series_ts(n: u64) -> i64 {
        1000 + (n as i64) * 12
    }

    #[tokio::test]
    async fn test_search_converges_on_earliest_block_at_or_after_target() {
        let head = 10_000;
        // Between blocks 499 (ts 6988) and 500 (ts 7000).
        let block = search_earliest_block(head, 6999, |n| Box::pin(async move { Ok(series_ts(n)) }))
            .await
            .unwrap();
        assert_eq!(block, 500);

        // Exact hit lands on that block.
        let block = search_earliest_block(head, 7000, |n| Box::pin(async move { Ok(series_ts(n)) }))
            .await
            .unwrap();
        assert_eq!(block, 500);
    }

    #[tokio::test]
    async fn test_search_target_before_genesis_returns_zero() {
        let block = search_earliest_block(10_000, 0, |n| Box::pin(async move { Ok(series_ts(n)) }))
            .await
            .unwrap();
        assert_eq!(block, 0);
    }

    #[tokio::test]
    async fn test_search_target_after_head_returns_head() {
        let block =
            search_earliest_block(10_000, i64::MAX, |n| Box::pin(async move { Ok(series_ts(n)) }))
                .await
                .unwrap();
        assert_eq!(block, 10_000);
    }

    #[tokio::test]
    async fn test_search_is_logarithmic() {
        let lookups = AtomicU32::new(0);
        search_earliest_block(1_000_000, 500_000, |n| {
            lookups.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(series_ts(n)) })
        })
        .await
        .unwrap();
        assert!(
            lookups.load(Ordering::SeqCst) <= 21,
            "expected O(log n) lookups, got {}",
            lookups.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_search_fails_whole_operation_on_lookup_error() {
        let result = search_earliest_block(10_000, 6999, |n| {
            Box::pin(async move {
                if n > 4000 {
                    Err(ProviderError::BlockLookup(n))
                } else {
                    Ok(series_ts(n))
                }
            })
        })
        .await;
        assert!(matches!(result, Err(ProviderError::BlockLookup(_))));
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64(&json!("0x10")).unwrap(), 16);
        assert_eq!(parse_hex_u64(&json!("0x0")).unwrap(), 0);
        assert!(parse_hex_u64(&json!(16)).is_err());
        assert!(parse_hex_u64(&json!("zz")).is_err());
    }
}
