//! Instrumented stores for testing cache interactions.
//!
//! [`RecordingStore`] wraps any [`CacheStore`] and records every call made
//! through it, so tests can assert that a store was (or was not) consulted,
//! which TTL a write carried, and how callers behave when the backend fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::memory::MemoryStore;
use crate::mode::StoreKind;
use crate::policy::{CacheKey, Ttl};
use crate::store::{CacheStore, StoreError};

/// A store that counts calls and remembers the TTL of every write.
///
/// Reads and writes can be made to fail independently with
/// [`fail_reads`](Self::fail_reads) and [`fail_writes`](Self::fail_writes).
///
/// ```rust
/// use stencil_cache::testing::RecordingStore;
/// use stencil_cache::{CacheKey, CacheStore, StoreKind, Ttl};
///
/// let store = RecordingStore::new();
/// let key = CacheKey::new("k");
/// store.set(StoreKind::Object, &key, "v", Ttl::Never).unwrap();
///
/// assert_eq!(store.set_count(), 1);
/// assert_eq!(store.ttl_of(StoreKind::Object, &key), Some(Ttl::Never));
/// ```
pub struct RecordingStore<S = MemoryStore> {
    inner: S,
    gets: AtomicUsize,
    sets: AtomicUsize,
    hits: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    ttls: Mutex<HashMap<(StoreKind, CacheKey), Ttl>>,
}

impl RecordingStore<MemoryStore> {
    /// Creates a recording store over a fresh [`MemoryStore`].
    pub fn new() -> Self {
        Self::wrap(MemoryStore::new())
    }
}

impl Default for RecordingStore<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CacheStore> RecordingStore<S> {
    /// Wraps an existing store.
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            ttls: Mutex::new(HashMap::new()),
        }
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get` calls, including failed ones.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls, including failed ones.
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of `get` calls that found a value.
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// TTL of the last successful write for a key, if any.
    ///
    /// [`Ttl::Never`] is how this store reports "never expires".
    pub fn ttl_of(&self, kind: StoreKind, key: &CacheKey) -> Option<Ttl> {
        self.ttls
            .lock()
            .ok()
            .and_then(|ttls| ttls.get(&(kind, key.clone())).copied())
    }

    /// Keys written so far, with their namespace.
    pub fn written_keys(&self) -> Vec<(StoreKind, CacheKey)> {
        self.ttls
            .lock()
            .map(|ttls| ttls.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: CacheStore> CacheStore for RecordingStore<S> {
    fn get(&self, kind: StoreKind, key: &CacheKey) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        let value = self.inner.get(kind, key)?;
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(value)
    }

    fn set(
        &self,
        kind: StoreKind,
        key: &CacheKey,
        value: &str,
        ttl: Ttl,
    ) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.inner.set(kind, key, value, ttl)?;
        if let Ok(mut ttls) = self.ttls.lock() {
            ttls.insert((kind, key.clone()), ttl);
        }
        Ok(())
    }

    fn clear(&self, kind: StoreKind) -> Result<(), StoreError> {
        self.inner.clear(kind)?;
        if let Ok(mut ttls) = self.ttls.lock() {
            ttls.retain(|(k, _), _| *k != kind);
        }
        Ok(())
    }
}
