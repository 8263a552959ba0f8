//! Cache coordination for per-child event data.
//!
//! The coordinator tracks one shared last-fetch timestamp per child and a
//! cached JSON payload per (child, event kind) in the local key-value
//! store. A payload is served without a remote query while the shared
//! timestamp is within the freshness window; any successful event write
//! invalidates all six payloads for that child at once.
//!
//! Storage failures here are never fatal: they are logged and read as a
//! cache miss, so the caller falls through to a live fetch.

use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;

use crate::domain::models::events::{EventKind, EventRecord};
use crate::storage::KeyValueStore;

/// How long a cached per-child dataset stays valid without re-querying.
pub const CACHE_DURATION_SECS: i64 = 5 * 60;

/// Composite key for one cached event payload.
///
/// Producing the storage string from a typed key keeps the namespace
/// unambiguous regardless of what child ids look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey<'a> {
    pub child_id: &'a str,
    pub kind: EventKind,
}

impl CacheKey<'_> {
    pub fn storage_key(&self) -> String {
        format!("events:{}:{}", self.kind.as_str(), self.child_id)
    }
}

fn last_fetch_key(child_id: &str) -> String {
    format!("last_fetch:{}", child_id)
}

/// Coordinates cache freshness and payload storage for event reads.
#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn KeyValueStore>,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Whether the child's cached data is inside the freshness window.
    ///
    /// One shared timestamp governs all six event kinds, so refreshing any
    /// single kind resets freshness for all of them.
    pub async fn is_fresh(&self, child_id: &str) -> bool {
        let raw = match self.store.get_item(&last_fetch_key(child_id)).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Cache freshness read failed for {}: {}", child_id, err);
                return false;
            }
        };
        let Some(raw) = raw else {
            return false;
        };
        let Ok(last_fetch_ms) = raw.parse::<i64>() else {
            warn!("Unparseable last-fetch timestamp for {}: {}", child_id, raw);
            return false;
        };
        let age_ms = Utc::now().timestamp_millis() - last_fetch_ms;
        age_ms < CACHE_DURATION_SECS * 1000
    }

    /// Record now as the child's last-fetch time.
    pub async fn mark_fetched(&self, child_id: &str) {
        let now_ms = Utc::now().timestamp_millis().to_string();
        if let Err(err) = self
            .store
            .set_item(&last_fetch_key(child_id), &now_ms)
            .await
        {
            warn!("Failed to stamp cache freshness for {}: {}", child_id, err);
        }
    }

    /// Drop every cached event payload and the freshness timestamp for the
    /// child. Called after every successful event write.
    pub async fn invalidate(&self, child_id: &str) {
        let mut keys: Vec<String> = EventKind::ALL
            .iter()
            .map(|kind| {
                CacheKey {
                    child_id,
                    kind: *kind,
                }
                .storage_key()
            })
            .collect();
        keys.push(last_fetch_key(child_id));

        if let Err(err) = self.store.multi_remove(&keys).await {
            warn!("Cache invalidation failed for {}: {}", child_id, err);
        } else {
            debug!("Invalidated cache for {}", child_id);
        }
    }

    /// Read and re-hydrate a cached payload. Any storage or parse failure
    /// reads as a miss.
    pub async fn read_events<T: EventRecord>(&self, child_id: &str) -> Option<Vec<T>> {
        let key = CacheKey {
            child_id,
            kind: T::KIND,
        }
        .storage_key();

        let raw = match self.store.get_item(&key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("Cache read failed for {}: {}", key, err);
                return None;
            }
        };
        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(events) => {
                debug!("Cache hit for {} ({} records)", key, events.len());
                Some(events)
            }
            Err(err) => {
                warn!("Discarding undecodable cache payload for {}: {}", key, err);
                None
            }
        }
    }

    /// Serialize and store a payload. Failures are logged and swallowed;
    /// the live result the caller already holds is still returned to the UI.
    pub async fn write_events<T: EventRecord>(&self, child_id: &str, events: &[T]) {
        let key = CacheKey {
            child_id,
            kind: T::KIND,
        }
        .storage_key();

        let payload = match serde_json::to_string(events) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Failed to serialize cache payload for {}: {}", key, err);
                return;
            }
        };
        if let Err(err) = self.store.set_item(&key, &payload).await {
            warn!("Cache write failed for {}: {}", key, err);
        }
    }

    /// Backdate the freshness stamp. Test helper for expiry scenarios.
    #[cfg(test)]
    pub(crate) async fn mark_fetched_at(&self, child_id: &str, timestamp_ms: i64) {
        self.store
            .set_item(&last_fetch_key(child_id), &timestamp_ms.to_string())
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::domain::models::events::WeightEvent;
    use crate::storage::memory::MemoryKeyValueStore;

    /// Key-value store whose every operation fails, for fail-open checks.
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("storage unavailable"))
        }
        async fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }
        async fn remove_item(&self, _key: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }
        async fn multi_remove(&self, _keys: &[String]) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }
    }

    fn sample_weights() -> Vec<WeightEvent> {
        let when = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        vec![WeightEvent::new("c1", when, 8, 3).unwrap()]
    }

    #[tokio::test]
    async fn test_fresh_after_mark_fetched() {
        let cache = CacheCoordinator::new(Arc::new(MemoryKeyValueStore::new()));
        assert!(!cache.is_fresh("c1").await);

        cache.mark_fetched("c1").await;
        assert!(cache.is_fresh("c1").await);
        // Freshness is per child
        assert!(!cache.is_fresh("c2").await);
    }

    #[tokio::test]
    async fn test_stale_after_window_elapses() {
        let cache = CacheCoordinator::new(Arc::new(MemoryKeyValueStore::new()));
        let stale = Utc::now().timestamp_millis() - (CACHE_DURATION_SECS * 1000 + 1);
        cache.mark_fetched_at("c1", stale).await;
        assert!(!cache.is_fresh("c1").await);
    }

    #[tokio::test]
    async fn test_payload_round_trip() {
        let cache = CacheCoordinator::new(Arc::new(MemoryKeyValueStore::new()));
        let weights = sample_weights();

        cache.write_events("c1", &weights).await;
        let cached: Vec<WeightEvent> = cache.read_events("c1").await.unwrap();
        assert_eq!(cached, weights);

        // Other children and kinds are untouched
        assert!(cache.read_events::<WeightEvent>("c2").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_payloads_and_freshness() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let cache = CacheCoordinator::new(store.clone());

        cache.write_events("c1", &sample_weights()).await;
        cache.mark_fetched("c1").await;

        cache.invalidate("c1").await;
        assert!(!cache.is_fresh("c1").await);
        assert!(cache.read_events::<WeightEvent>("c1").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_broken_store_fails_open() {
        let cache = CacheCoordinator::new(Arc::new(BrokenStore));

        // Every operation degrades to a miss instead of erroring
        assert!(!cache.is_fresh("c1").await);
        assert!(cache.read_events::<WeightEvent>("c1").await.is_none());
        cache.write_events("c1", &sample_weights()).await;
        cache.mark_fetched("c1").await;
        cache.invalidate("c1").await;
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_a_miss() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let cache = CacheCoordinator::new(store.clone());

        let key = CacheKey {
            child_id: "c1",
            kind: EventKind::Weight,
        }
        .storage_key();
        store.set_item(&key, "not json").await.unwrap();

        assert!(cache.read_events::<WeightEvent>("c1").await.is_none());
    }
}
