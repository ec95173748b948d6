use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A single cached value plus the instant it was stored.
struct CacheEntry<T> {
    data: T,
    cached_at: Instant,
}

/// TTL-keyed cache, last-writer-wins, no invalidation beyond TTL expiry —
/// reads accept staleness up to the configured TTL rather than racing a
/// writer.
pub struct TtlCache<T: Clone> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        if entry.cached_at.elapsed() < self.ttl {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: String, data: T) {
        self.entries.insert(
            key,
            CacheEntry {
                data,
                cached_at: Instant::now(),
            },
        );
    }
}
