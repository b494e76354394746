//! TTL-keyed revocation cache
//!
//! One generic cache primitive serves the OCSP client (keyed by certificate
//! pair), the CRL client (keyed by distribution-point URL), and the
//! validation orchestrator (keyed by request fingerprint). Entries own their
//! expiry instant, computed when they are inserted; a lookup re-checks it
//! against the injected clock and drops dead entries on the way out.
//!
//! # Thread Safety
//!
//! The cache is a DashMap of independently synchronized entries: concurrent
//! callers for different keys never block each other, and there is no global
//! lock around the structure.

use crate::clock::Clock;
use dashmap::DashMap;
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached value and the instant it stops being served.
///
/// Owned exclusively by the cache map that created it.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries currently stored (including not-yet-swept expired ones)
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that missed or hit an expired entry
    pub misses: u64,
}

/// Thread-safe TTL cache with opportunistic cleanup.
///
/// Expired entries are swept when the cache grows past its capacity and on a
/// periodic interval, whichever comes first; there is no background thread.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    max_entries: usize,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> std::fmt::Debug for TtlCache<K, V>
where
    K: Eq + Hash + std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries)
            .field("max_entries", &self.max_entries)
            .field("sweep_interval", &self.sweep_interval)
            .field("last_sweep", &self.last_sweep)
            .field("clock", &self.clock)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache bounded at `max_entries` with the given sweep interval.
    pub fn new(max_entries: usize, sweep_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: DashMap::new(),
            max_entries,
            sweep_interval,
            last_sweep: Mutex::new(now),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a non-expired value.
    ///
    /// An expired entry is removed and reported as a miss, forcing the
    /// caller to re-fetch.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a value that expires at an absolute instant.
    ///
    /// Values already past their expiry are not stored.
    pub fn insert_until(&self, key: K, value: V, expires_at: Instant) {
        self.maybe_sweep();

        if expires_at <= self.clock.now() {
            return;
        }

        if self.entries.len() >= self.max_entries {
            let swept = self.purge_expired();
            debug!(swept, "revocation cache over capacity, swept expired entries");
            if self.entries.len() >= self.max_entries {
                self.evict_soonest_expiring();
            }
        }

        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Insert a value with a relative TTL.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.insert_until(key, value, expires_at);
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let dead: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut purged = 0;
        for key in dead {
            if self.entries.remove(&key).is_some() {
                purged += 1;
            }
        }
        purged
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Run a periodic sweep if the interval has elapsed.
    fn maybe_sweep(&self) {
        let now = self.clock.now();
        let mut last_sweep = self.last_sweep.lock().unwrap();
        if now.duration_since(*last_sweep) >= self.sweep_interval {
            *last_sweep = now;
            drop(last_sweep);
            self.purge_expired();
        }
    }

    /// When the cache is full of live entries, drop the one closest to
    /// expiring to make room.
    fn evict_soonest_expiring(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;

    fn cache(max_entries: usize) -> (TtlCache<String, u32>, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let cache = TtlCache::new(
            max_entries,
            Duration::from_secs(300),
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    #[test]
    fn returns_value_before_expiry_and_none_after() {
        let (cache, clock) = cache(10);
        cache.insert("key".to_string(), 7, Duration::from_secs(60));

        // One second before expiry: hit
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get(&"key".to_string()), Some(7));

        // One second after expiry: miss, entry dropped
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get(&"key".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_insert_is_not_stored() {
        let (cache, clock) = cache(10);
        let past = clock.now();
        clock.advance(Duration::from_secs(10));

        cache.insert_until("key".to_string(), 1, past);
        assert!(cache.is_empty());
    }

    #[test]
    fn overflow_sweeps_expired_entries() {
        let (cache, clock) = cache(2);
        cache.insert("a".to_string(), 1, Duration::from_secs(5));
        cache.insert("b".to_string(), 2, Duration::from_secs(500));

        // "a" expires; inserting a third entry sweeps it out
        clock.advance(Duration::from_secs(10));
        cache.insert("c".to_string(), 3, Duration::from_secs(500));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn overflow_with_live_entries_evicts_soonest_expiring() {
        let (cache, _clock) = cache(2);
        cache.insert("soon".to_string(), 1, Duration::from_secs(10));
        cache.insert("later".to_string(), 2, Duration::from_secs(1000));

        cache.insert("new".to_string(), 3, Duration::from_secs(500));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"soon".to_string()), None);
        assert_eq!(cache.get(&"later".to_string()), Some(2));
        assert_eq!(cache.get(&"new".to_string()), Some(3));
    }

    #[test]
    fn periodic_sweep_runs_on_insert() {
        let (cache, clock) = cache(100);
        cache.insert("old".to_string(), 1, Duration::from_secs(30));

        // Past both the entry TTL and the sweep interval
        clock.advance(Duration::from_secs(301));
        cache.insert("new".to_string(), 2, Duration::from_secs(30));

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let (cache, _clock) = cache(10);
        cache.insert("key".to_string(), 1, Duration::from_secs(60));

        cache.get(&"key".to_string());
        cache.get(&"key".to_string());
        cache.get(&"absent".to_string());

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn clear_drops_everything() {
        let (cache, _clock) = cache(10);
        for i in 0..5 {
            cache.insert(format!("key-{i}"), i, Duration::from_secs(60));
        }
        assert_eq!(cache.len(), 5);

        cache.clear();
        assert!(cache.is_empty());
    }
}
