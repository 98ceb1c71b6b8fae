//! Read-through cache with per-read expiry.
//!
//! Entries carry the instant they were stored; the maximum acceptable age is
//! supplied by each read rather than fixed per entry, so different callers
//! can tolerate different staleness for the same key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use haulboard_core::HaulResult;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::freshness::CacheRead;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (absent or expired).
    pub misses: u64,
    /// Number of entries currently stored, expired ones included.
    pub entry_count: u64,
    /// Number of explicit invalidations.
    pub invalidations: u64,
    /// Fetched values dropped because the key changed while fetching.
    pub rejected_fills: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Bumped on every write or invalidation of a key.
    generations: HashMap<String, u64>,
    /// Bumped by `clear`, invalidating every outstanding ticket.
    epoch: u64,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            generations: HashMap::new(),
            epoch: 0,
        }
    }
}

impl<V> CacheState<V> {
    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &str) {
        *self.generations.entry(key.to_string()).or_insert(0) += 1;
    }
}

/// Snapshot of a key's write generation taken before a backend fetch.
///
/// A fill made with a ticket only lands if nothing wrote or invalidated the
/// key in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillTicket {
    key: String,
    generation: u64,
    epoch: u64,
}

impl FillTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Process-wide key/value cache with expiry evaluated at read time.
///
/// Cloning shares the underlying map; construct one per context and pass it
/// to the components that need it.
///
/// # Example
///
/// ```ignore
/// let cache = ReadThroughCache::new();
/// let read = cache
///     .get_or_fetch("operators:list", Duration::from_secs(60), || backend_fetch())
///     .await?;
/// ```
pub struct ReadThroughCache<V> {
    state: Arc<RwLock<CacheState<V>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    invalidations: Arc<AtomicU64>,
    rejected_fills: Arc<AtomicU64>,
}

impl<V> Default for ReadThroughCache<V> {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            invalidations: Arc::new(AtomicU64::new(0)),
            rejected_fills: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<V> Clone for ReadThroughCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
            invalidations: Arc::clone(&self.invalidations),
            rejected_fills: Arc::clone(&self.rejected_fills),
        }
    }
}

impl<V> std::fmt::Debug for ReadThroughCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V> ReadThroughCache<V>
where
    V: Clone + Send + Sync,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value if present and `now - stored_at <= max_age`.
    ///
    /// Expired entries are reported absent; a stale value is never returned.
    pub async fn get(&self, key: &str, max_age: Duration) -> Option<V> {
        self.get_with_age(key, max_age).await.map(|(value, _)| value)
    }

    async fn get_with_age(&self, key: &str, max_age: Duration) -> Option<(V, Duration)> {
        let state = self.state.read().await;
        let fresh = state.entries.get(key).and_then(|entry| {
            let age = Instant::now().saturating_duration_since(entry.stored_at);
            (age <= max_age).then(|| (entry.value.clone(), age))
        });

        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        fresh
    }

    /// Store a value stamped with the current instant, replacing any prior
    /// entry for the key.
    pub async fn set(&self, key: &str, value: V) {
        let mut state = self.state.write().await;
        state.bump(key);
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Remove the entry for `key`. No-op if absent.
    pub async fn invalidate(&self, key: &str) {
        let mut state = self.state.write().await;
        state.bump(key);
        if state.entries.remove(key).is_some() {
            tracing::debug!(key, "cache entry invalidated");
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.epoch += 1;
    }

    /// Take a fill ticket for `key` before fetching from the backend.
    pub async fn ticket(&self, key: &str) -> FillTicket {
        let state = self.state.read().await;
        FillTicket {
            key: key.to_string(),
            generation: state.generation(key),
            epoch: state.epoch,
        }
    }

    /// Store `value` only if the key was not written or invalidated since
    /// `ticket` was taken. Returns whether the value was stored.
    pub async fn set_if_current(&self, ticket: &FillTicket, value: V) -> bool {
        let mut state = self.state.write().await;
        if state.epoch != ticket.epoch || state.generation(&ticket.key) != ticket.generation {
            self.rejected_fills.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = ticket.key.as_str(), "discarding fill that raced a write");
            return false;
        }
        state.bump(&ticket.key);
        state.entries.insert(
            ticket.key.clone(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Serve `key` from the cache, or run `fetch` and cache its result.
    ///
    /// Fetch errors are returned without touching the cache. A fetched value
    /// is always returned to the caller but is only stored if no invalidation
    /// raced the fetch, so a deleted entry is never resurrected.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        max_age: Duration,
        fetch: F,
    ) -> HaulResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HaulResult<V>>,
    {
        if let Some((value, age)) = self.get_with_age(key, max_age).await {
            return Ok(CacheRead::from_cache(value, age));
        }

        let ticket = self.ticket(key).await;
        let value = fetch().await?;
        self.set_if_current(&ticket, value.clone()).await;
        Ok(CacheRead::from_fetch(value))
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entry_count = self.state.read().await.entries.len() as u64;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            rejected_fills: self.rejected_fills.load(Ordering::Relaxed),
        }
    }
}
