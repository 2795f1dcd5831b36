//! In-process store backed by moka.
//!
//! [`MemoryStore`] keeps one bounded moka cache per [`StoreKind`], so the
//! namespaces can never see each other's keys. Each entry carries the TTL it
//! was written with and a per-entry [`Expiry`] hands that TTL to moka, which
//! enforces it. Entries written with [`Ttl::Never`] have no expiry but can
//! still be evicted when the cache is full.

use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;

use crate::mode::StoreKind;
use crate::policy::{CacheKey, Ttl};
use crate::store::{CacheEntry, CacheStore, StoreError};

/// Default number of entries kept per namespace.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Per-entry expiry that reads the TTL stored alongside the value.
struct EntryExpiry;

impl Expiry<CacheKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl.duration()
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // a rewrite supersedes the old entry, including its lifetime
        value.ttl.duration()
    }
}

/// Bounded in-memory store with one namespace per [`StoreKind`].
///
/// Thread-safe (moka handles concurrent access internally) and cheap to
/// clone: clones share the same underlying caches.
///
/// ```rust
/// use stencil_cache::{CacheKey, CacheStore, MemoryStore, StoreKind, Ttl};
///
/// let store = MemoryStore::new();
/// let key = CacheKey::new("greeting");
/// store.set(StoreKind::Object, &key, "hello", Ttl::Never).unwrap();
///
/// assert_eq!(store.get(StoreKind::Object, &key).unwrap().as_deref(), Some("hello"));
/// assert_eq!(store.get(StoreKind::Transient, &key).unwrap(), None);
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    object: Cache<CacheKey, CacheEntry>,
    transient: Cache<CacheKey, CacheEntry>,
    site_transient: Cache<CacheKey, CacheEntry>,
}

impl MemoryStore {
    /// Creates a store with [`DEFAULT_CAPACITY`] entries per namespace.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a store holding at most `capacity` entries per namespace.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            object: build_cache(capacity),
            transient: build_cache(capacity),
            site_transient: build_cache(capacity),
        }
    }

    fn namespace(&self, kind: StoreKind) -> &Cache<CacheKey, CacheEntry> {
        match kind {
            StoreKind::Object => &self.object,
            StoreKind::Transient => &self.transient,
            StoreKind::SiteTransient => &self.site_transient,
        }
    }

    /// Returns the full stored entry, including its TTL and timestamp.
    pub fn entry(&self, kind: StoreKind, key: &CacheKey) -> Option<CacheEntry> {
        self.namespace(kind).get(key)
    }

    /// Returns the approximate number of live entries in a namespace.
    ///
    /// Pending evictions are applied first, so the count reflects expiry.
    pub fn len(&self, kind: StoreKind) -> u64 {
        let cache = self.namespace(kind);
        cache.run_pending_tasks();
        cache.entry_count()
    }

    /// Returns true if the namespace holds no entries.
    pub fn is_empty(&self, kind: StoreKind) -> bool {
        self.len(kind) == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("object", &self.object.entry_count())
            .field("transient", &self.transient.entry_count())
            .field("site_transient", &self.site_transient.entry_count())
            .finish()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, kind: StoreKind, key: &CacheKey) -> Result<Option<String>, StoreError> {
        Ok(self.namespace(kind).get(key).map(|entry| entry.value))
    }

    fn set(
        &self,
        kind: StoreKind,
        key: &CacheKey,
        value: &str,
        ttl: Ttl,
    ) -> Result<(), StoreError> {
        tracing::trace!(%kind, %key, %ttl, "memory store insert");
        self.namespace(kind)
            .insert(key.clone(), CacheEntry::new(key.clone(), value, ttl));
        Ok(())
    }

    fn clear(&self, kind: StoreKind) -> Result<(), StoreError> {
        let cache = self.namespace(kind);
        let dropped = cache.entry_count();
        cache.invalidate_all();
        cache.run_pending_tasks();
        tracing::trace!(%kind, dropped, "cleared memory namespace");
        Ok(())
    }
}

fn build_cache(capacity: u64) -> Cache<CacheKey, CacheEntry> {
    Cache::builder()
        .max_capacity(capacity)
        .expire_after(EntryExpiry)
        .build()
}
