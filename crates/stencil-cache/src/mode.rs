//! Cache modes and the store namespaces they select.
//!
//! A [`CacheMode`] is what a caller asks for on a request. Three of its
//! variants name a concrete backing namespace ([`StoreKind`]); the other two
//! are policy instructions: [`CacheMode::None`] bypasses storage entirely and
//! [`CacheMode::UseDefault`] defers to the configured default at decision time.
//!
//! Modes have stable string forms so they can be written in configuration
//! files:
//!
//! | Mode | String |
//! |------|--------|
//! | `UseDefault` | `default` |
//! | `None` | `none` |
//! | `Object` | `cache` |
//! | `Transient` | `transient` |
//! | `SiteTransient` | `site-transient` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caching behavior requested for a single render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CacheMode {
    /// Use the process-wide default mode.
    #[default]
    #[serde(rename = "default")]
    UseDefault,
    /// Neither read nor write the cache.
    #[serde(rename = "none")]
    None,
    /// In-process object cache.
    #[serde(rename = "cache")]
    Object,
    /// Per-site transient store.
    #[serde(rename = "transient")]
    Transient,
    /// Network-wide transient store.
    #[serde(rename = "site-transient")]
    SiteTransient,
}

impl CacheMode {
    /// All modes, in declaration order.
    pub const ALL: [CacheMode; 5] = [
        CacheMode::UseDefault,
        CacheMode::None,
        CacheMode::Object,
        CacheMode::Transient,
        CacheMode::SiteTransient,
    ];

    /// Returns the canonical string form of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::UseDefault => "default",
            CacheMode::None => "none",
            CacheMode::Object => "cache",
            CacheMode::Transient => "transient",
            CacheMode::SiteTransient => "site-transient",
        }
    }

    /// Returns the backing namespace for concrete modes.
    ///
    /// `UseDefault` and `None` select no store and return `None`.
    pub fn store_kind(&self) -> Option<StoreKind> {
        match self {
            CacheMode::Object => Some(StoreKind::Object),
            CacheMode::Transient => Some(StoreKind::Transient),
            CacheMode::SiteTransient => Some(StoreKind::SiteTransient),
            CacheMode::UseDefault | CacheMode::None => None,
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown cache mode string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cache mode '{0}' (expected one of: default, none, cache, transient, site-transient)")]
pub struct ParseCacheModeError(pub String);

impl FromStr for CacheMode {
    type Err = ParseCacheModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(CacheMode::UseDefault),
            "none" => Ok(CacheMode::None),
            "cache" | "object" => Ok(CacheMode::Object),
            "transient" => Ok(CacheMode::Transient),
            "site-transient" | "site_transient" => Ok(CacheMode::SiteTransient),
            _ => Err(ParseCacheModeError(s.to_string())),
        }
    }
}

/// A concrete backing namespace.
///
/// Identical keys under different kinds never collide: the kind is part of
/// the effective key space, not just a routing hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    /// In-process object cache.
    Object,
    /// Per-site transient store.
    Transient,
    /// Network-wide transient store.
    SiteTransient,
}

impl StoreKind {
    /// All store kinds.
    pub const ALL: [StoreKind; 3] = [
        StoreKind::Object,
        StoreKind::Transient,
        StoreKind::SiteTransient,
    ];

    /// Returns the cache mode that selects this namespace.
    pub fn mode(&self) -> CacheMode {
        match self {
            StoreKind::Object => CacheMode::Object,
            StoreKind::Transient => CacheMode::Transient,
            StoreKind::SiteTransient => CacheMode::SiteTransient,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_string_roundtrip() {
        for mode in CacheMode::ALL {
            assert_eq!(mode.as_str().parse::<CacheMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_parse_aliases() {
        assert_eq!("object".parse::<CacheMode>().unwrap(), CacheMode::Object);
        assert_eq!(
            " Site_Transient ".parse::<CacheMode>().unwrap(),
            CacheMode::SiteTransient
        );
    }

    #[test]
    fn test_mode_parse_unknown() {
        let err = "redis".parse::<CacheMode>().unwrap_err();
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn test_store_kind_only_for_concrete_modes() {
        assert_eq!(CacheMode::UseDefault.store_kind(), None);
        assert_eq!(CacheMode::None.store_kind(), None);
        for kind in StoreKind::ALL {
            assert_eq!(kind.mode().store_kind(), Some(kind));
        }
    }

    #[test]
    fn test_mode_serde_uses_string_forms() {
        let json = serde_json::to_string(&CacheMode::SiteTransient).unwrap();
        assert_eq!(json, "\"site-transient\"");
        let mode: CacheMode = serde_json::from_str("\"cache\"").unwrap();
        assert_eq!(mode, CacheMode::Object);
    }

    #[test]
    fn test_default_mode_is_use_default() {
        assert_eq!(CacheMode::default(), CacheMode::UseDefault);
    }
}
