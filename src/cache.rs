//! Result caching keyed by request fingerprint.
//!
//! The cache maps a [`CacheKey`] to a previously computed
//! [`GenerationResult`] with an expiry. Storage is pluggable through
//! [`CacheStore`] (in-memory default); the TTL and in-flight deduplication
//! logic live here regardless of the backing store.

use crate::api::CacheKey;
use crate::error::Result;
use crate::traits::GenerationResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// A cached result and its expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The original generation's result (`from_cache = false` as stored;
    /// lookups flip the flag on the returned copy).
    pub result: GenerationResult,
    /// Entries at or past this instant are treated as absent and evicted
    /// lazily on lookup.
    pub expires_at: Instant,
}

/// Pluggable key/value storage for cache entries.
///
/// Implementations only store and retrieve; expiry and deduplication are
/// handled by [`ResultCache`]. The default is [`InMemoryStore`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the entry for `key`, expired or not.
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Store `entry` under `key`, replacing any previous entry.
    async fn put(&self, key: CacheKey, entry: CacheEntry);

    /// Drop the entry for `key`, if present.
    async fn remove(&self, key: &CacheKey);
}

/// Default in-memory store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.write().await.insert(key, entry);
    }

    async fn remove(&self, key: &CacheKey) {
        self.entries.write().await.remove(key);
    }
}

/// TTL cache over a [`CacheStore`] with at-most-one-in-flight generation per
/// key.
///
/// Concurrent requests for the same uncached key coordinate through a
/// per-key lock: the first caller generates while later arrivals wait, then
/// find the stored result on their double-checked lookup instead of
/// re-issuing the call. A failed generation propagates to its caller and
/// caches nothing; waiters then attempt their own generation in turn.
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    inflight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ResultCache {
    /// Cache with the in-memory store and the given TTL. A zero TTL disables
    /// caching entirely.
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), ttl)
    }

    /// Cache over a custom store.
    pub fn with_store(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Whether caching is active (non-zero TTL).
    pub fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Look up `key`, evicting a stale entry and reporting a miss when the
    /// entry is absent or expired. Hits come back with `from_cache = true`.
    pub async fn lookup(&self, key: &CacheKey) -> Option<GenerationResult> {
        let entry = self.store.get(key).await?;
        if Instant::now() >= entry.expires_at {
            self.store.remove(key).await;
            return None;
        }
        let mut result = entry.result;
        result.from_cache = true;
        Some(result)
    }

    /// Store `result` under `key` with `expires_at = now + ttl`. A disabled
    /// cache stores nothing.
    pub async fn insert(&self, key: CacheKey, result: GenerationResult) {
        if !self.enabled() {
            return;
        }
        self.store
            .put(
                key,
                CacheEntry {
                    result,
                    expires_at: Instant::now() + self.ttl,
                },
            )
            .await;
    }

    /// Return the cached result for `key` or run `generate` to produce one,
    /// storing it on success.
    ///
    /// At most one generation per key is in flight at a time; see the type
    /// docs for the coordination protocol.
    pub async fn get_or_generate<F, Fut>(&self, key: CacheKey, generate: F) -> Result<GenerationResult>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<GenerationResult>>,
    {
        if !self.enabled() {
            return generate().await;
        }

        // Fast path: already cached.
        if let Some(result) = self.lookup(&key).await {
            metrics::counter!("cache.total", "status" => "hit").increment(1);
            return Ok(result);
        }

        // Slow path: coordinate generation per key.
        let lock = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let _guard = lock.lock().await;

        // Double-check after acquiring the per-key lock: the first holder
        // may have stored the result while we waited.
        if let Some(result) = self.lookup(&key).await {
            metrics::counter!("cache.total", "status" => "hit").increment(1);
            let mut inflight = self.inflight.lock().await;
            inflight.remove(&key);
            return Ok(result);
        }

        metrics::counter!("cache.total", "status" => "miss").increment(1);
        let result = generate().await;

        if let Ok(result) = &result {
            self.insert(key.clone(), result.clone()).await;
        }

        // Bound in-flight map growth by removing this key once the
        // generation path completes. Waiters hold cloned lock Arcs.
        {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(&key);
        }

        result
    }
}
