//! Fingerprint-keyed result cache.
//!
//! First tier of the resilience chain: consulted before any provider
//! attempt. Entries carry their own TTL; an expired entry is absent on
//! lookup. The cache is bounded (default 500 entries) so long client
//! sessions cannot grow it without limit — eviction beyond expiry is
//! moka's LRU policy.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;

use crate::telemetry;
use crate::types::GenerationResult;

/// Default maximum number of cached results.
pub const DEFAULT_CACHE_CAPACITY: u64 = 500;

/// Default time-to-live for cached results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// A cached result plus the TTL it was stored with.
#[derive(Clone)]
struct CachedResult {
    result: GenerationResult,
    ttl: Duration,
}

/// Per-entry expiry policy: each entry lives for the TTL recorded at
/// insertion time.
struct PerEntryTtl;

impl Expiry<String, CachedResult> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded in-memory cache of generation results, keyed by request
/// fingerprint.
pub struct ResultCache {
    entries: Cache<String, CachedResult>,
    default_ttl: Duration,
}

impl ResultCache {
    /// Create a cache with the default capacity and TTL.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }

    /// Create a cache with a custom capacity and default TTL.
    pub fn with_config(capacity: u64, default_ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            entries,
            default_ttl,
        }
    }

    /// Look up a cached result by request fingerprint.
    ///
    /// Returns `None` on miss or when the entry's TTL has elapsed.
    /// Emits cache hit/miss metrics.
    pub fn get(&self, fingerprint: &str) -> Option<GenerationResult> {
        match self.entries.get(fingerprint) {
            Some(cached) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(cached.result)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert a result under the given fingerprint with the default TTL.
    pub fn insert(&self, fingerprint: String, result: GenerationResult) {
        self.insert_with_ttl(fingerprint, result, self.default_ttl);
    }

    /// Insert a result with an explicit TTL.
    pub fn insert_with_ttl(&self, fingerprint: String, result: GenerationResult, ttl: Duration) {
        self.entries.insert(fingerprint, CachedResult { result, ttl });
    }

    /// Number of entries currently cached (pending evictions included).
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
