//! Key-value store seam for cached bootstrap entries.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

/// Store failure. Never fatal to a bootstrap lookup.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("bootstrap store unavailable: {0}")]
    Unavailable(String),
}

/// Shared, multi-writer key-value store holding serialized bootstrap
/// entries.
///
/// No transactional guarantees are expected: writes are idempotent
/// overwrites and a lost write only causes a later miss.
#[async_trait]
pub trait BootstrapStore: Send + Sync {
    /// Value stored under `key`, `None` when absent or expired.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the store cannot be reached.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite `key` with `value`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the store cannot be reached.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Remove `key` if present.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the store cannot be reached.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Minimum time between two sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Process-local store with per-key expiry.
///
/// Expired entries are dropped when read, and swept from the whole map at
/// most once per [`SWEEP_INTERVAL`] on write, so keys of sessions that never
/// come back do not accumulate.
#[derive(Debug)]
pub struct InMemoryBootstrapStore {
    entries: DashMap<String, (Vec<u8>, Instant)>,
    last_sweep: Mutex<Instant>,
}

impl Default for InMemoryBootstrapStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBootstrapStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn sweep_expired(&self, now: Instant) {
        {
            let mut last_sweep = self.last_sweep.lock();
            if now.duration_since(*last_sweep) < SWEEP_INTERVAL {
                return;
            }
            *last_sweep = now;
        }

        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        tracing::debug!(
            evicted = before.saturating_sub(self.entries.len()),
            "expired bootstrap cache entries swept"
        );
    }

    /// Number of stored keys, expired ones included until swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl BootstrapStore for InMemoryBootstrapStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if *expires_at > now {
                return Ok(Some(value.clone()));
            }
        }
        self.entries
            .remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        self.sweep_expired(now);
        self.entries.insert(key.to_owned(), (value, now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let store = InMemoryBootstrapStore::new();
        store
            .put("k", b"v".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_keys_are_swept_on_write() {
        let store = InMemoryBootstrapStore::new();
        for i in 0..1000 {
            store
                .put(&format!("session-{i}"), b"v".to_vec(), Duration::from_secs(30))
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store
            .put("fresh", b"v".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fresh").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn live_entries_survive_a_sweep() {
        let store = InMemoryBootstrapStore::new();
        store
            .put("short", b"s".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        store
            .put("long", b"l".to_vec(), Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::advance(SWEEP_INTERVAL).await;
        store
            .put("fresh", b"f".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("long").await.unwrap(), Some(b"l".to_vec()));
    }

    #[tokio::test]
    async fn put_overwrites_and_delete_removes() {
        let store = InMemoryBootstrapStore::new();
        store
            .put("k", b"one".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put("k", b"two".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.len(), 1);

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
