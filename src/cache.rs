//! In-process TTL cache shared by the price oracle and chain data providers.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Read-through/write-through key-value cache with per-cache TTL.
///
/// Concurrent writes for the same key are benign last-write-wins races:
/// values are derived deterministically from the same upstream source, so
/// staleness is bounded by the TTL rather than being correctness-breaking.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, (Instant, V)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get a value if present and fresh.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|(stored_at, value)| {
            if stored_at.elapsed() <= self.ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    /// Insert or overwrite a value, resetting its TTL.
    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(key, (Instant::now(), value));
    }
}
