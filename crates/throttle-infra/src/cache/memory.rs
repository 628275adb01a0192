//! In-memory cache implementation - used as fallback when Redis is unavailable.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use throttle_core::ports::{Cache, CacheError, Clock, SystemClock};

/// Expired entries are swept on write at most this often...
const SWEEP_INTERVAL_MS: u64 = 60_000;
/// ...or whenever the map grows past the next size threshold.
const MIN_SWEEP_LEN: usize = 1024;

struct CacheEntry {
    value: String,
    expires_at_ms: Option<u64>,
}

/// In-memory cache using a simple HashMap with async RwLock.
///
/// Expiry is evaluated against the injected [`Clock`], so tests driving a
/// `ManualClock` see TTLs elapse together with strategy windows.
/// Expired entries are dropped when read, and writes sweep the whole map
/// periodically so keys that are never read again do not pile up.
/// Note: Data is lost on process restart and is not shared between processes.
pub struct InMemoryCache {
    store: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    last_sweep_ms: AtomicU64,
    sweep_at_len: AtomicUsize,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            store: RwLock::new(HashMap::new()),
            clock,
            last_sweep_ms: AtomicU64::new(now),
            sweep_at_len: AtomicUsize::new(MIN_SWEEP_LEN),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = self.clock.now_millis();
        let store = self.store.read().await;
        store
            .values()
            .filter(|entry| !Self::is_expired(entry, now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_expired(entry: &CacheEntry, now_ms: u64) -> bool {
        entry.expires_at_ms.map(|exp| now_ms >= exp).unwrap_or(false)
    }

    /// Drop expired entries if the sweep interval has passed or the map has
    /// outgrown its threshold. Called with the write lock held.
    fn maybe_sweep(&self, store: &mut HashMap<String, CacheEntry>, now_ms: u64) {
        let due = now_ms.saturating_sub(self.last_sweep_ms.load(Ordering::Relaxed)) >= SWEEP_INTERVAL_MS;
        if !due && store.len() < self.sweep_at_len.load(Ordering::Relaxed) {
            return;
        }

        let before = store.len();
        store.retain(|_, entry| !Self::is_expired(entry, now_ms));

        self.last_sweep_ms.store(now_ms, Ordering::Relaxed);
        self.sweep_at_len
            .store((store.len() * 2).max(MIN_SWEEP_LEN), Ordering::Relaxed);

        if before > store.len() {
            tracing::debug!(removed = before - store.len(), live = store.len(), "Swept expired cache entries");
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now_millis();
        let store = self.store.read().await;
        let Some(entry) = store.get(key) else {
            return Ok(None);
        };

        if Self::is_expired(entry, now) {
            drop(store);
            // Clean up expired entry with write lock
            let mut store = self.store.write().await;
            if store.get(key).is_some_and(|e| Self::is_expired(e, now)) {
                store.remove(key);
            }
            return Ok(None);
        }

        Ok(Some(entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let now = self.clock.now_millis();
        let expires_at_ms = ttl.map(|d| {
            now.saturating_add(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        });

        let mut store = self.store.write().await;
        self.maybe_sweep(&mut store, now);
        store.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at_ms,
            },
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = self.clock.now_millis();
        let mut store = self.store.write().await;
        Ok(store
            .remove(key)
            .is_some_and(|entry| !Self::is_expired(&entry, now)))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let now = self.clock.now_millis();
        let mut store = self.store.write().await;
        let mut removed = 0;

        store.retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if !Self::is_expired(entry, now) {
                removed += 1;
            }
            false
        });

        Ok(removed)
    }
}
