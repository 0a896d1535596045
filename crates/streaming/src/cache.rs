use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use foundation::geometry::Feature;
use foundation::time::{Clock, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    written_at: Timestamp,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_valid(&self, now: Timestamp) -> bool {
        now.saturating_since(self.written_at) < self.ttl
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct Inner<T> {
    entries: BTreeMap<String, CacheEntry<T>>,
    stats: CacheStats,
}

/// URL-keyed response cache with a TTL per entry.
///
/// - Keys are the exact request URL, query string included.
/// - Expired entries are dropped lazily when read.
/// - `max_entries` is a soft cap enforced on writes: expired entries go
///   first, then the oldest writes (ties broken by key order).
#[derive(Debug)]
pub struct ResponseCache<T: Clone> {
    clock: Arc<dyn Clock>,
    max_entries: usize,
    inner: Mutex<Inner<T>>,
}

/// The cache every domain fetcher shares.
pub type FeatureCache = ResponseCache<Arc<Vec<Feature>>>;

impl<T: Clone> ResponseCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_max_entries(clock, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(clock: Arc<dyn Clock>, max_entries: usize) -> Self {
        Self {
            clock,
            max_entries,
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn get(&self, url: &str) -> Option<T> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let valid = match inner.entries.get(url) {
            None => {
                inner.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_valid(now),
        };

        if !valid {
            inner.entries.remove(url);
            inner.stats.misses += 1;
            inner.stats.evictions += 1;
            debug!(url, "cache entry expired");
            return None;
        }

        inner.stats.hits += 1;
        inner.entries.get(url).map(|e| e.data.clone())
    }

    pub fn set(&self, url: impl Into<String>, data: T, ttl: Duration) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.entries.insert(
            url.into(),
            CacheEntry {
                data,
                written_at: now,
                ttl,
            },
        );
        if inner.entries.len() > self.max_entries {
            let evicted = Self::cleanup(&mut inner, now, self.max_entries);
            debug!(evicted, remaining = inner.entries.len(), "cache cleanup");
        }
    }

    fn cleanup(inner: &mut Inner<T>, now: Timestamp, max_entries: usize) -> usize {
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.is_valid(now));

        if inner.entries.len() > max_entries {
            let mut by_age: Vec<(Timestamp, String)> = inner
                .entries
                .iter()
                .map(|(k, e)| (e.written_at, k.clone()))
                .collect();
            by_age.sort();
            let excess = inner.entries.len() - max_entries;
            for (_, key) in by_age.into_iter().take(excess) {
                inner.entries.remove(&key);
            }
        }

        let evicted = before - inner.entries.len();
        inner.stats.evictions += evicted as u64;
        evicted
    }

    pub fn invalidate(&self, url: &str) -> bool {
        self.inner.lock().entries.remove(url).is_some()
    }

    /// Drops every entry whose key contains `pattern`.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| !k.contains(pattern));
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(pattern, removed, "cache entries invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
