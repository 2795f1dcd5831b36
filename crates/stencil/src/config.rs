//! Pipeline configuration.
//!
//! [`StencilConfig`] holds the process-level settings: extra template
//! locations, the default cache mode and TTL, theme roots and the bundled
//! fallback directory. It deserializes from YAML:
//!
//! ```yaml
//! locations:
//!   - /srv/site/templates
//! default_cache_mode: transient
//! default_ttl_secs: 600
//! view_dirs: [views]
//! themes:
//!   active: /srv/site/themes/child
//!   parent: /srv/site/themes/base
//! bundled_dir: /usr/share/stencil/views
//! compile_cache: true
//! memory_capacity: 5000
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stencil_cache::{CacheMode, CachePolicy, MemoryStore, Ttl, DEFAULT_CAPACITY, DEFAULT_TTL_SECS};

use crate::engine::{MiniJinjaEngine, DEFAULT_COMPILE_CACHE_CAPACITY};
use crate::error::ConfigError;
use crate::location::{LocationRegistry, Locator, StaticThemes};
use crate::pipeline::{RenderPipeline, RenderPipelineBuilder};

/// Active and parent theme roots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub active: Option<PathBuf>,
    pub parent: Option<PathBuf>,
}

/// Settings for building a [`RenderPipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilConfig {
    /// Extra directories searched before everything else, in order
    pub locations: Vec<PathBuf>,
    /// Mode used for requests that ask for [`CacheMode::UseDefault`]
    pub default_cache_mode: CacheMode,
    /// TTL used when a request gives no override; 0 means never expire
    pub default_ttl_secs: u64,
    /// Sub-directories searched inside each theme root
    pub view_dirs: Vec<String>,
    pub themes: ThemeConfig,
    /// Last-resort directory
    pub bundled_dir: Option<PathBuf>,
    /// Keep compiled templates between requests
    pub compile_cache: bool,
    /// Entry bound per namespace of the in-memory store
    pub memory_capacity: u64,
}

impl Default for StencilConfig {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            default_cache_mode: CacheMode::None,
            default_ttl_secs: DEFAULT_TTL_SECS,
            view_dirs: vec!["views".to_string()],
            themes: ThemeConfig::default(),
            bundled_dir: None,
            compile_cache: false,
            memory_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl StencilConfig {
    /// Default settings: caching off, one hour TTL, `views` sub-directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!(path = %path.display(), "loaded stencil config");
        Ok(config)
    }

    /// Adds a custom template location.
    pub fn location(mut self, dir: impl Into<PathBuf>) -> Self {
        self.locations.push(dir.into());
        self
    }

    /// Sets the mode used when a request asks for the default.
    pub fn default_cache_mode(mut self, mode: CacheMode) -> Self {
        self.default_cache_mode = mode;
        self
    }

    /// Sets the TTL used when a request has no override. Zero never expires.
    pub fn default_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    /// Replaces the view sub-directories searched under each theme root.
    pub fn view_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the active theme root.
    pub fn active_theme(mut self, dir: impl Into<PathBuf>) -> Self {
        self.themes.active = Some(dir.into());
        self
    }

    /// Sets the parent theme root.
    pub fn parent_theme(mut self, dir: impl Into<PathBuf>) -> Self {
        self.themes.parent = Some(dir.into());
        self
    }

    /// Sets the bundled default directory, searched last.
    pub fn bundled_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_dir = Some(dir.into());
        self
    }

    /// Enables or disables the compiled-template cache.
    pub fn compile_cache(mut self, enabled: bool) -> Self {
        self.compile_cache = enabled;
        self
    }

    /// Sets the entry bound per in-memory store namespace.
    pub fn memory_capacity(mut self, capacity: u64) -> Self {
        self.memory_capacity = capacity;
        self
    }

    /// The cache policy these settings describe.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy::new(self.default_cache_mode, Ttl::from_secs(self.default_ttl_secs))
    }

    /// The locator these settings describe, with a fresh registry.
    pub fn locator(&self) -> Locator {
        let themes = StaticThemes::new(self.themes.active.clone(), self.themes.parent.clone());
        let mut locator = Locator::new(LocationRegistry::from_paths(self.locations.iter()))
            .with_themes(themes)
            .with_view_dirs(self.view_dirs.iter().cloned());
        if let Some(bundled) = &self.bundled_dir {
            locator = locator.with_bundled(bundled.clone());
        }
        locator
    }

    /// A builder preloaded with these settings.
    ///
    /// Hooks, filesystem or engine can still be swapped before `build`.
    pub fn builder(&self) -> RenderPipelineBuilder {
        let mut engine = MiniJinjaEngine::new();
        if self.compile_cache {
            engine = engine.with_compile_cache(DEFAULT_COMPILE_CACHE_CAPACITY);
        }
        RenderPipeline::builder()
            .locator(self.locator())
            .policy(self.policy())
            .store(MemoryStore::with_capacity(self.memory_capacity))
            .engine(engine)
    }

    /// Builds a pipeline from these settings.
    pub fn into_pipeline(self) -> RenderPipeline {
        self.builder().build()
    }
}

impl RenderPipeline {
    /// Builds a pipeline from configuration.
    pub fn from_config(config: &StencilConfig) -> RenderPipeline {
        config.builder().build()
    }
}
