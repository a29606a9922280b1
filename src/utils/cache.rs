//! Value Cache Module
//!
//! TTL-keyed store shared by the fallback engine and the balance aggregator.
//! The cache is an explicit instance handed to its users; there is no global.
//!
//! Features:
//! - Pluggable backing store (`CacheStore`), DashMap by default
//! - Last write wins, entries are overwritten and never merged
//! - No request coalescing: concurrent misses may both hit the network
//! - Reads report the entry age; `get_fresh` never returns expired entries
//! - HIT/MISS counters for monitoring

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::models::types::ExtractionMode;

/// Query parameters, ordered so fingerprints are deterministic
pub type QueryParams = BTreeMap<String, String>;

/// Deterministic identity of a query, used as the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryFingerprint(String);

#[derive(Serialize)]
struct FingerprintParts<'a> {
    s: &'a [String],
    p: &'a QueryParams,
    m: &'a str,
}

impl QueryFingerprint {
    /// Serialize `(ordered sources, params, mode)`
    pub fn new(sources: &[String], params: &QueryParams, mode: ExtractionMode) -> Self {
        let parts = FingerprintParts {
            s: sources,
            p: params,
            m: mode.as_str(),
        };
        // Serializing strings and string maps cannot fail
        let key = serde_json::to_string(&parts)
            .unwrap_or_else(|_| format!("{:?}|{:?}|{}", sources, params, mode.as_str()));
        Self(key)
    }

    /// Fingerprint built from an arbitrary key
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored value with its write time
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, stored_at: Instant) -> Self {
        Self { value, stored_at }
    }

    /// Age at `now`, zero if `now` precedes the write
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// Valid iff `now - stored_at < ttl`
    pub fn is_fresh_at(&self, now: Instant, ttl: Duration) -> bool {
        self.age_at(now) < ttl
    }
}

/// Backing store of a `ValueCache`
pub trait CacheStore<V>: Send + Sync {
    fn load(&self, key: &QueryFingerprint) -> Option<CacheEntry<V>>;
    fn store(&self, key: QueryFingerprint, entry: CacheEntry<V>);
    fn remove(&self, key: &QueryFingerprint);
    fn len(&self) -> usize;
    /// Keep only entries for which `keep` returns true
    fn retain(&self, keep: &dyn Fn(&CacheEntry<V>) -> bool);
    fn clear(&self);
}

/// Default store: sharded concurrent map, no external locking
pub struct DashMapStore<V> {
    map: DashMap<QueryFingerprint, CacheEntry<V>>,
}

impl<V> Default for DashMapStore<V> {
    fn default() -> Self {
        Self { map: DashMap::new() }
    }
}

impl<V: Clone + Send + Sync> CacheStore<V> for DashMapStore<V> {
    fn load(&self, key: &QueryFingerprint) -> Option<CacheEntry<V>> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    fn store(&self, key: QueryFingerprint, entry: CacheEntry<V>) {
        self.map.insert(key, entry);
    }

    fn remove(&self, key: &QueryFingerprint) {
        self.map.remove(key);
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn retain(&self, keep: &dyn Fn(&CacheEntry<V>) -> bool) {
        self.map.retain(|_, entry| keep(entry));
    }

    fn clear(&self) {
        self.map.clear();
    }
}

/// Runtime clock, so paused test time also ages cache entries
pub fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// TTL cache for one value domain (metrics, balances, ...)
#[derive(Clone)]
pub struct ValueCache<V> {
    store: Arc<dyn CacheStore<V>>,
    /// Default TTL of this domain
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V: Clone + Send + Sync + 'static> ValueCache<V> {
    /// Cache backed by a DashMap
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(ttl, Arc::new(DashMapStore::default()))
    }

    /// Cache backed by a custom store
    pub fn with_store(ttl: Duration, store: Arc<dyn CacheStore<V>>) -> Self {
        Self {
            store,
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value and its age, regardless of freshness
    pub fn get(&self, key: &QueryFingerprint) -> Option<(V, Duration)> {
        self.get_at(key, clock_now())
    }

    pub fn get_at(&self, key: &QueryFingerprint, now: Instant) -> Option<(V, Duration)> {
        self.store
            .load(key)
            .map(|entry| {
                let age = entry.age_at(now);
                (entry.value, age)
            })
    }

    /// Value only if younger than `ttl`
    pub fn get_fresh(&self, key: &QueryFingerprint, ttl: Duration) -> Option<V> {
        self.get_fresh_at(key, ttl, clock_now())
    }

    pub fn get_fresh_at(&self, key: &QueryFingerprint, ttl: Duration, now: Instant) -> Option<V> {
        match self.store.load(key) {
            Some(entry) if entry.is_fresh_at(now, ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "✅ CACHE HIT: {} (age: {}ms)",
                    key,
                    entry.age_at(now).as_millis()
                );
                Some(entry.value)
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS (expired): {}", key);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS: {}", key);
                None
            }
        }
    }

    /// Store a value written at `now`, replacing any previous entry
    pub fn put(&self, key: QueryFingerprint, value: V, now: Instant) {
        debug!("💾 CACHE SET: {}", key);
        self.store.store(key, CacheEntry::new(value, now));
    }

    pub fn invalidate(&self, key: &QueryFingerprint) {
        self.store.remove(key);
    }

    /// Drop entries older than `ttl`. Never runs on its own.
    pub fn cleanup_expired(&self, ttl: Duration) -> usize {
        let before = self.store.len();
        let now = clock_now();
        self.store.retain(&|entry| entry.is_fresh_at(now, ttl));
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 CACHE CLEANUP: {} expired entries removed", removed);
        }
        removed
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Hit/miss statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
