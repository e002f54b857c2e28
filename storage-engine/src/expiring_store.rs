use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Snapshot of the store counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > ttl
    }
}

/// DashMap-based store with a single TTL and a soft entry bound.
///
/// Expired entries are removed lazily on lookup, and by a full sweep whenever
/// a store leaves more than `max_entries` entries behind. The sweep only
/// drops expired entries, so the map can stay above the bound while every
/// entry is still fresh.
pub struct ExpiringStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> ExpiringStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Return the value for `key` if it is still fresh.
    pub fn lookup(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(self.ttl, now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            // Release the shard read lock before taking the write lock
            drop(entry);
            // A concurrent store may have refreshed the key in between
            self.entries
                .remove_if(key, |_, entry| entry.is_expired(self.ttl, now));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or overwrite `key`, sweeping expired entries if the bound is exceeded.
    pub fn store(&self, key: impl Into<String>, value: V) {
        self.insert_at(key.into(), value, Instant::now());
    }

    fn insert_at(&self, key: String, value: V, stored_at: Instant) {
        self.entries.insert(key, Entry { value, stored_at });

        if self.entries.len() > self.max_entries {
            let removed = self.sweep_expired();
            debug!(
                removed,
                remaining = self.entries.len(),
                "response store exceeded {} entries, swept expired entries",
                self.max_entries
            );
        }
    }

    /// Remove every entry, or every entry whose key contains `pattern`.
    /// Returns the number of removed entries.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        match pattern {
            None => {
                let removed = self.entries.len();
                self.entries.clear();
                removed
            }
            Some(pattern) => {
                let mut removed = 0;
                self.entries.retain(|key, _| {
                    let keep = !key.contains(pattern);
                    if !keep {
                        removed += 1;
                    }
                    keep
                });
                removed
            }
        }
    }

    /// Full O(n) pass removing every expired entry.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(self.ttl, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            size: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Debug for ExpiringStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("entry_count", &self.entries.len())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

/// Periodically sweep expired entries until the store is dropped.
pub fn spawn_sweeper<V>(store: &Arc<ExpiringStore<V>>, every: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let store: Weak<ExpiringStore<V>> = Arc::downgrade(store);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            let removed = store.sweep_expired();
            if removed > 0 {
                debug!(removed, "background sweep removed expired responses");
            }
        }
    })
}
