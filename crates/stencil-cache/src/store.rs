//! Store adapter trait and error type.
//!
//! [`CacheStore`] is the uniform facade over backing stores. Every call names
//! the [`StoreKind`] it targets, and implementations must keep the kinds in
//! separate namespaces.
//!
//! Stores are allowed to forget: an entry evicted before its TTL is a plain
//! miss, not an error. Errors are reserved for backends that could not answer
//! at all, and callers treat them as misses on read and ignore them on write.

use std::time::SystemTime;

use crate::mode::StoreKind;
use crate::policy::{CacheKey, Ttl};

/// Errors reported by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer within its deadline.
    #[error("cache backend timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The backend rejected the value.
    #[error("cache backend rejected entry '{key}': {message}")]
    Rejected {
        /// Key that was being written
        key: String,
        /// Backend message
        message: String,
    },

    /// The backend does not serve this namespace.
    #[error("cache backend does not support the {0} namespace")]
    UnsupportedKind(StoreKind),
}

/// A stored render.
///
/// Entries are immutable. Refreshing a key writes a new entry that
/// supersedes the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Derived key
    pub key: CacheKey,
    /// Rendered output
    pub value: String,
    /// Wall-clock time the entry was written
    pub stored_at: SystemTime,
    /// Lifetime requested at write time
    pub ttl: Ttl,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(key: CacheKey, value: impl Into<String>, ttl: Ttl) -> Self {
        Self {
            key,
            value: value.into(),
            stored_at: SystemTime::now(),
            ttl,
        }
    }
}

/// Uniform get/set access to a keyed backing store.
///
/// Each call is expected to be individually atomic; no read-modify-write
/// sequences are issued against the store.
pub trait CacheStore: Send + Sync {
    /// Looks up a key in the given namespace.
    ///
    /// `Ok(None)` is a miss.
    fn get(&self, kind: StoreKind, key: &CacheKey) -> Result<Option<String>, StoreError>;

    /// Writes a value, superseding any previous value under the same key.
    fn set(&self, kind: StoreKind, key: &CacheKey, value: &str, ttl: Ttl)
        -> Result<(), StoreError>;

    /// Drops every entry in the given namespace.
    fn clear(&self, kind: StoreKind) -> Result<(), StoreError>;
}

impl<S: CacheStore + ?Sized> CacheStore for std::sync::Arc<S> {
    fn get(&self, kind: StoreKind, key: &CacheKey) -> Result<Option<String>, StoreError> {
        (**self).get(kind, key)
    }

    fn set(
        &self,
        kind: StoreKind,
        key: &CacheKey,
        value: &str,
        ttl: Ttl,
    ) -> Result<(), StoreError> {
        (**self).set(kind, key, value, ttl)
    }

    fn clear(&self, kind: StoreKind) -> Result<(), StoreError> {
        (**self).clear(kind)
    }
}

/// A store that holds nothing.
///
/// Every read misses and every write is discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl CacheStore for NullStore {
    fn get(&self, _kind: StoreKind, _key: &CacheKey) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(
        &self,
        _kind: StoreKind,
        _key: &CacheKey,
        _value: &str,
        _ttl: Ttl,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear(&self, _kind: StoreKind) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_null_store_always_misses() {
        let store = NullStore;
        let key = CacheKey::new("k");
        store.set(StoreKind::Object, &key, "v", Ttl::Never).unwrap();
        assert_eq!(store.get(StoreKind::Object, &key).unwrap(), None);
    }

    #[test]
    fn test_arc_store_delegates() {
        let store: Arc<dyn CacheStore> = Arc::new(NullStore);
        assert!(store.get(StoreKind::Transient, &CacheKey::new("k")).unwrap().is_none());
        store.clear(StoreKind::Transient).unwrap();
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::UnsupportedKind(StoreKind::SiteTransient);
        assert!(err.to_string().contains("site-transient"));

        let err = StoreError::Rejected {
            key: "stencil_abc".into(),
            message: "too large".into(),
        };
        assert!(err.to_string().contains("stencil_abc"));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_entry_new_stamps_time() {
        let before = SystemTime::now();
        let entry = CacheEntry::new(CacheKey::new("k"), "v", Ttl::Never);
        assert!(entry.stored_at >= before);
        assert_eq!(entry.value, "v");
    }
}
