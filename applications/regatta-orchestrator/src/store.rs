//! Keyed, time-expiring observation storage
//!
//! The store is the single synchronization point between the sampling loop
//! (writer) and concurrent observation readers. It holds opaque serialized
//! values; decoding and fallback policy belong to the feed layer, so that a
//! corrupt value degrades one region rather than the whole call.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::Result;

/// Keyed get/set storage with per-entry expiry
///
/// An `Err` from either method means the store infrastructure itself is
/// unreachable. A missing or lapsed key is `Ok(None)`, never an error.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Fetch the value for a key, if present and not expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value under a key, superseding any previous value. The entry
    /// lapses after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-memory observation store
///
/// Lapsed entries are masked on read and overwritten by the next sampling
/// pass; no background sweeper is needed at this cardinality (one entry per
/// configured region).
#[derive(Default)]
pub struct MemoryStore {
    entries: tokio::sync::RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store
            .set("price:US-East", b"payload".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        let value = store.get("price:US-East").await.unwrap();
        assert_eq!(value, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("price:EU-West").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_lapses_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("price:US-East", b"payload".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.get("price:US-East").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_expiry() {
        let store = MemoryStore::new();
        store
            .set("price:US-East", b"old".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;

        store
            .set("price:US-East", b"new".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;

        // 16s after the first write but only 8s after the second
        assert_eq!(
            store.get("price:US-East").await.unwrap(),
            Some(b"new".to_vec())
        );
    }
}
