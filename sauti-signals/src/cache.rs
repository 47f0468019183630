//! In-memory TTL cache for computed signal lists, dashboards and realtime updates.
//!
//! Entries are evicted lazily: staleness is checked on read and a stale entry
//! is dropped rather than served.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::Clock;

/// Key/value cache with a per-entry time to live.
pub trait Cache<V>: Send + Sync {
    /// Fresh value for `key`, if any.
    fn get(&self, key: &str) -> Option<V>;

    /// Store `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: V, ttl: Duration);

    /// Drop `key` regardless of age.
    fn evict(&self, key: &str);
}

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Served only while `age < ttl`.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.cached_at).to_std().unwrap_or_default();
        age < self.ttl
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// [`Cache`] backed by a locked `HashMap` and an injected clock.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Remove every stale entry.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, entry| entry.is_fresh(now));
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().map(|e| e.len()).unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn miss(&self) -> Option<V> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }
}

impl<V: Clone + Send + Sync> Cache<V> for TtlCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        let stale = {
            let Ok(entries) = self.entries.read() else {
                return self.miss();
            };
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.data.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if stale {
            if let Ok(mut entries) = self.entries.write() {
                // Another writer may have refreshed the entry in between.
                if entries.get(key).is_some_and(|e| !e.is_fresh(now)) {
                    entries.remove(key);
                }
            }
        }
        self.miss()
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            cached_at: self.clock.now(),
            ttl,
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), entry);
        }
    }

    fn evict(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}
