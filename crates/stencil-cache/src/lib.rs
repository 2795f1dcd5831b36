//! # Stencil Cache - Render caching policy and stores
//!
//! `stencil-cache` decides whether a rendered template should be served from a
//! cache, recomputed and stored, or recomputed without touching any store. It
//! is the caching half of the `stencil` rendering pipeline, but has no
//! dependency on templates and can be used on its own.
//!
//! ## Core Concepts
//!
//! - [`CacheMode`]: What a request asks for (`UseDefault`, `None`, `Object`,
//!   `Transient`, `SiteTransient`)
//! - [`CachePolicy`]: Turns a mode and an optional expiry override into a
//!   [`CacheDecision`], and derives [`CacheKey`]s
//! - [`CacheStore`]: Uniform get/set facade over backends, namespaced by
//!   [`StoreKind`]
//! - [`MemoryStore`]: moka-backed in-process store honoring per-entry TTLs
//!
//! ## Quick Start
//!
//! ```rust
//! use stencil_cache::{CacheMode, CachePolicy, CacheStore, MemoryStore, Ttl};
//! use serde_json::json;
//! use std::path::Path;
//!
//! let policy = CachePolicy::new(CacheMode::Object, Ttl::from_secs(600));
//! let store = MemoryStore::new();
//!
//! let path = Path::new("/theme/views/index.html");
//! let context = json!({"title": "Home"});
//!
//! let decision = policy.decide(CacheMode::UseDefault, None);
//! let key = policy.key(path, &context, CacheMode::UseDefault);
//! let kind = decision.store_kind.unwrap();
//!
//! assert_eq!(store.get(kind, &key).unwrap(), None);
//! store.set(kind, &key, "<h1>Home</h1>", decision.ttl).unwrap();
//! assert_eq!(store.get(kind, &key).unwrap().as_deref(), Some("<h1>Home</h1>"));
//! ```

mod memory;
mod mode;
mod policy;
mod store;
pub mod testing;

pub use memory::{MemoryStore, DEFAULT_CAPACITY};
pub use mode::{CacheMode, ParseCacheModeError, StoreKind};
pub use policy::{CacheDecision, CacheKey, CachePolicy, Ttl, DEFAULT_TTL_SECS, KEY_PREFIX};
pub use store::{CacheEntry, CacheStore, NullStore, StoreError};
