//! Bounded LRU+TTL cache for grep responses.
//!
//! Owned by the query façade; the ingest path calls [`GrepCache::invalidate`]
//! after every committed batch, so cached responses never outlive the
//! index state they were computed from.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default cache bound.
pub const DEFAULT_CAPACITY: usize = 200;
/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// The full request tuple; any difference means a different cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrepCacheKey {
    pub pattern: String,
    pub project: Option<String>,
    pub language: Option<String>,
    pub case_sensitive: bool,
    pub max_results: usize,
    pub context_lines: usize,
    pub grouped: bool,
    pub include_assets: bool,
    pub symbols: bool,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct GrepCache<V> {
    entries: Mutex<LruCache<GrepCacheKey, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone> GrepCache<V> {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is non-zero");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Returns a live entry, dropping it if the TTL expired.
    #[must_use]
    pub fn get(&self, key: &GrepCacheKey) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: GrepCacheKey, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                Entry {
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drops every entry. Called by the ingest path.
    pub fn invalidate(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
