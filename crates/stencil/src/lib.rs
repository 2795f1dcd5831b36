//! # Stencil - Template resolution and cached rendering
//!
//! `stencil` finds a template file by name across an ordered set of
//! directories, renders it with a data context, and optionally keeps the
//! output in a cache store so identical requests skip the engine.
//!
//! ## Core Concepts
//!
//! - [`Locator`] / [`LocationChain`]: Which directories are searched, in what
//!   order (registered locations, calling code, themes, bundled defaults)
//! - [`Resolver`]: First existing file for a list of candidate names
//! - [`CachePolicy`] / [`CacheStore`]: Whether and where output is cached
//!   (re-exported from `stencil-cache`)
//! - [`TemplateEngine`]: Compile and render; [`MiniJinjaEngine`] by default
//! - [`RenderPipeline`]: All of the above for one [`TemplateRequest`], with
//!   [`Hooks`] at fixed points
//! - [`StencilConfig`]: YAML-loadable settings for building a pipeline
//!
//! ## Quick Start
//!
//! ```rust
//! use stencil::{CacheMode, StencilConfig, TemplateRequest};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("greeting.tmpl"), "Hello, {{ name }}!").unwrap();
//!
//! let pipeline = StencilConfig::new()
//!     .location(dir.path())
//!     .default_cache_mode(CacheMode::Object)
//!     .into_pipeline();
//!
//! let request = TemplateRequest::new(["greeting.tmpl"]).data(json!({"name": "World"}));
//!
//! let first = pipeline.render(&request).unwrap();
//! let second = pipeline.render(&request).unwrap();
//! assert_eq!(first.as_str(), Some("Hello, World!"));
//! assert!(second.is_cached());
//! ```
//!
//! ## Candidate Order
//!
//! Resolution is candidate-major: the first candidate name is looked for in
//! every directory before the second name is tried anywhere. See
//! [`resolver`] for the details.
//!
//! ## Caching
//!
//! Output is keyed by resolved path, context data and cache mode. A request
//! can override the TTL with [`TemplateRequest::expires`]; zero means the entry
//! never expires, and leaving it unset uses the configured default. Cache
//! faults are logged through `tracing` and never fail a render.

mod config;
pub mod engine;
mod error;
pub mod fs;
pub mod hooks;
pub mod location;
mod pipeline;
mod request;
pub mod resolver;

pub use config::{StencilConfig, ThemeConfig};
pub use engine::{
    CompiledTemplate, EngineError, MiniJinjaEngine, MiniJinjaTemplate, TemplateEngine,
    DEFAULT_COMPILE_CACHE_CAPACITY,
};
pub use error::{ConfigError, RenderError};
pub use hooks::{HookError, HookPhase, Hooks, RenderEvent, RenderOutcome};
pub use location::{
    CallingContext, LocationChain, LocationRegistry, Locator, StaticThemes, ThemeHierarchy,
};
pub use pipeline::{RenderPipeline, RenderPipelineBuilder, Rendered};
pub use request::TemplateRequest;
pub use resolver::{ResolvedFile, Resolver};

// Cache layer
pub use stencil_cache::{
    CacheDecision, CacheKey, CacheMode, CachePolicy, CacheStore, MemoryStore, NullStore,
    StoreError, StoreKind, Ttl,
};
