//! Cache policy: read/write decisions, time-to-live and key derivation.
//!
//! [`CachePolicy`] turns a request's [`CacheMode`] and optional `expires`
//! override into a [`CacheDecision`]. It also owns key derivation, so that
//! every store sees the same key for the same render.
//!
//! # Expiry Overrides
//!
//! The override is a signed number of seconds, and its three shapes mean
//! different things:
//!
//! | Override | Outcome |
//! |----------|---------|
//! | `None` | configured default TTL |
//! | `Some(n)`, `n > 0` | expire after `n` seconds |
//! | `Some(n)`, `n <= 0` | never expire |
//!
//! # Key Derivation
//!
//! Keys are a SHA-256 digest over the resolved template path, the serialized
//! context data and the effective cache mode. Context maps serialize with
//! sorted keys, so insertion order never changes the key.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::mode::{CacheMode, StoreKind};

/// Default time-to-live applied when a request does not override it.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Prefix for every derived cache key.
pub const KEY_PREFIX: &str = "stencil_";

/// How long a stored entry may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ttl {
    /// The entry never expires; it may still be evicted under pressure.
    Never,
    /// The entry expires after the given duration.
    After(Duration),
}

impl Ttl {
    /// Builds a TTL from a whole number of seconds, where `0` means never.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Ttl::Never
        } else {
            Ttl::After(Duration::from_secs(secs))
        }
    }

    /// Interprets a request-level expiry override.
    ///
    /// Zero and negative values mean "cache indefinitely".
    pub fn from_override(secs: i64) -> Self {
        if secs <= 0 {
            Ttl::Never
        } else {
            Ttl::After(Duration::from_secs(secs.unsigned_abs()))
        }
    }

    /// Returns the expiry duration, or `None` for entries that never expire.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::Never => None,
            Ttl::After(d) => Some(*d),
        }
    }

    /// Returns true if the entry never expires.
    pub fn is_never(&self) -> bool {
        matches!(self, Ttl::Never)
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::from_secs(DEFAULT_TTL_SECS)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => f.write_str("never"),
            Ttl::After(d) => write!(f, "{}s", d.as_secs()),
        }
    }
}

/// The outcome of evaluating a cache mode for one request.
///
/// `should_read` and `should_write` are carried separately. The current
/// policy always sets them together, but consumers must honor each flag on
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDecision {
    /// Consult the store before rendering.
    pub should_read: bool,
    /// Store the rendered output afterwards.
    pub should_write: bool,
    /// Lifetime for written entries.
    pub ttl: Ttl,
    /// Namespace to read from and write to. `None` when caching is bypassed.
    pub store_kind: Option<StoreKind>,
}

impl CacheDecision {
    /// A decision that bypasses the store entirely.
    pub fn bypass() -> Self {
        Self {
            should_read: false,
            should_write: false,
            ttl: Ttl::Never,
            store_kind: None,
        }
    }

    /// Returns true if neither reads nor writes will happen.
    pub fn is_bypass(&self) -> bool {
        !self.should_read && !self.should_write
    }
}

/// A derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps a raw key string.
    ///
    /// Keys normally come from [`CachePolicy::key`]; this exists for stores
    /// and tests that need to name keys directly.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Evaluates cache modes against process-wide defaults.
///
/// # Example
///
/// ```rust
/// use stencil_cache::{CacheMode, CachePolicy, StoreKind, Ttl};
/// use std::time::Duration;
///
/// let policy = CachePolicy::new(CacheMode::Transient, Ttl::from_secs(300));
///
/// let decision = policy.decide(CacheMode::UseDefault, None);
/// assert!(decision.should_read && decision.should_write);
/// assert_eq!(decision.store_kind, Some(StoreKind::Transient));
/// assert_eq!(decision.ttl, Ttl::After(Duration::from_secs(300)));
///
/// let forever = policy.decide(CacheMode::Object, Some(0));
/// assert_eq!(forever.ttl, Ttl::Never);
///
/// assert!(policy.decide(CacheMode::None, Some(60)).is_bypass());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    default_mode: CacheMode,
    default_ttl: Ttl,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(CacheMode::None, Ttl::default())
    }
}

impl CachePolicy {
    /// Creates a policy with the given default mode and default TTL.
    pub fn new(default_mode: CacheMode, default_ttl: Ttl) -> Self {
        Self {
            default_mode,
            default_ttl,
        }
    }

    /// Returns the configured default mode.
    pub fn default_mode(&self) -> CacheMode {
        self.default_mode
    }

    /// Returns the configured default TTL.
    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    /// Substitutes the default for `UseDefault`.
    ///
    /// A default that is itself `UseDefault` evaluates as `None`.
    pub fn effective_mode(&self, mode: CacheMode) -> CacheMode {
        match mode {
            CacheMode::UseDefault => match self.default_mode {
                CacheMode::UseDefault => CacheMode::None,
                other => other,
            },
            other => other,
        }
    }

    /// Decides whether to read, write, and for how long.
    pub fn decide(&self, mode: CacheMode, expires: Option<i64>) -> CacheDecision {
        let Some(store_kind) = self.effective_mode(mode).store_kind() else {
            return CacheDecision::bypass();
        };

        let ttl = match expires {
            Some(secs) => Ttl::from_override(secs),
            None => self.default_ttl,
        };

        CacheDecision {
            should_read: true,
            should_write: true,
            ttl,
            store_kind: Some(store_kind),
        }
    }

    /// Derives the cache key for a render.
    ///
    /// Two renders share a key exactly when they resolve to the same file,
    /// serialize to the same context and use the same effective mode.
    pub fn key(&self, path: &Path, context: &serde_json::Value, mode: CacheMode) -> CacheKey {
        let mode = self.effective_mode(mode);
        let context = match context {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };

        let mut hasher = Sha256::new();
        hasher.update(path.as_os_str().as_encoded_bytes());
        hasher.update([0x1f]);
        hasher.update(context.to_string().as_bytes());
        hasher.update([0x1f]);
        hasher.update(mode.as_str().as_bytes());

        CacheKey(format!("{}{}", KEY_PREFIX, hex::encode(hasher.finalize())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn policy() -> CachePolicy {
        CachePolicy::new(CacheMode::Object, Ttl::from_secs(120))
    }

    #[test]
    fn test_none_bypasses_everything() {
        let decision = policy().decide(CacheMode::None, Some(60));
        assert!(!decision.should_read);
        assert!(!decision.should_write);
        assert_eq!(decision.store_kind, None);
    }

    #[test]
    fn test_use_default_substitutes_configured_mode() {
        let decision = policy().decide(CacheMode::UseDefault, None);
        assert_eq!(decision.store_kind, Some(StoreKind::Object));
        assert!(decision.should_read && decision.should_write);
    }

    #[test]
    fn test_use_default_with_none_default_bypasses() {
        let policy = CachePolicy::new(CacheMode::None, Ttl::default());
        assert!(policy.decide(CacheMode::UseDefault, None).is_bypass());
    }

    #[test]
    fn test_self_referential_default_bypasses() {
        let policy = CachePolicy::new(CacheMode::UseDefault, Ttl::default());
        assert_eq!(policy.effective_mode(CacheMode::UseDefault), CacheMode::None);
        assert!(policy.decide(CacheMode::UseDefault, Some(10)).is_bypass());
    }

    #[test]
    fn test_explicit_mode_ignores_default() {
        let decision = policy().decide(CacheMode::SiteTransient, None);
        assert_eq!(decision.store_kind, Some(StoreKind::SiteTransient));
    }

    #[test]
    fn test_ttl_outcomes_are_distinct() {
        let p = policy();
        let omitted = p.decide(CacheMode::Object, None).ttl;
        let zero = p.decide(CacheMode::Object, Some(0)).ttl;
        let negative = p.decide(CacheMode::Object, Some(-5)).ttl;
        let positive = p.decide(CacheMode::Object, Some(60)).ttl;

        assert_eq!(omitted, Ttl::After(Duration::from_secs(120)));
        assert_eq!(zero, Ttl::Never);
        assert_eq!(negative, Ttl::Never);
        assert_eq!(positive, Ttl::After(Duration::from_secs(60)));
        assert_ne!(omitted, zero);
    }

    #[test]
    fn test_ttl_from_secs_zero_is_never() {
        assert!(Ttl::from_secs(0).is_never());
        assert_eq!(Ttl::from_secs(5).duration(), Some(Duration::from_secs(5)));
        assert_eq!(Ttl::Never.to_string(), "never");
        assert_eq!(Ttl::from_secs(5).to_string(), "5s");
    }

    #[test]
    fn test_key_is_stable_for_identical_input() {
        let p = policy();
        let path = PathBuf::from("/theme/index.tmpl");
        let a = p.key(&path, &json!({"a": 1, "b": [1, 2]}), CacheMode::Object);
        let b = p.key(&path, &json!({"b": [1, 2], "a": 1}), CacheMode::Object);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with(KEY_PREFIX));
    }

    #[test]
    fn test_key_differs_per_dimension() {
        let p = policy();
        let path = PathBuf::from("/theme/index.tmpl");
        let base = p.key(&path, &json!({"a": 1}), CacheMode::Object);

        let other_path = p.key(
            &PathBuf::from("/default/index.tmpl"),
            &json!({"a": 1}),
            CacheMode::Object,
        );
        let other_data = p.key(&path, &json!({"a": 2}), CacheMode::Object);
        let other_mode = p.key(&path, &json!({"a": 1}), CacheMode::Transient);

        assert_ne!(base, other_path);
        assert_ne!(base, other_data);
        assert_ne!(base, other_mode);
    }

    #[test]
    fn test_key_uses_effective_mode() {
        let p = policy();
        let path = PathBuf::from("/a.tmpl");
        assert_eq!(
            p.key(&path, &json!({}), CacheMode::UseDefault),
            p.key(&path, &json!({}), CacheMode::Object)
        );
    }

    #[test]
    fn test_key_treats_null_context_as_empty() {
        let p = policy();
        let path = PathBuf::from("/a.tmpl");
        assert_eq!(
            p.key(&path, &serde_json::Value::Null, CacheMode::Object),
            p.key(&path, &json!({}), CacheMode::Object)
        );
    }
}
