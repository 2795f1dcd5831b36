//! Hook system for the render pipeline.
//!
//! Hooks let a host adjust a request at fixed points without wrapping the
//! pipeline. Each point holds an ordered chain; transforming hooks receive the
//! previous hook's output.
//!
//! # Pipeline Position
//!
//! ```text
//! TemplateRequest
//!   → PRE-RESOLVE HOOK   ← rewrite the calling context
//!   → resolver
//!   → POST-RESOLVE HOOK  ← rewrite the resolved path
//!   → PRE-RENDER HOOK    ← rewrite the context data (before key derivation)
//!   → cache lookup / engine / cache store
//!   → POST-RENDER HOOK   ← rewrite the output, fresh or cached
//!   → COMPLETION         ← observe the outcome, every request
//! ```
//!
//! The stored cache value is always the engine output, so post-render hooks
//! run again on every hit.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::location::CallingContext;

/// The phase at which a hook error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreResolve,
    PostResolve,
    PreRender,
    PostRender,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::PreResolve => write!(f, "pre-resolve"),
            HookPhase::PostResolve => write!(f, "post-resolve"),
            HookPhase::PreRender => write!(f, "pre-render"),
            HookPhase::PostRender => write!(f, "post-render"),
        }
    }
}

/// Error returned by a hook.
#[derive(Debug, Error)]
#[error("hook error ({phase}): {message}")]
pub struct HookError {
    /// Human-readable error message
    pub message: String,
    /// The hook phase where the error occurred
    pub phase: HookPhase,
    /// The underlying error source, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HookError {
    fn new(phase: HookPhase, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            phase,
            source: None,
        }
    }

    /// Creates a new hook error for the pre-resolve phase.
    pub fn pre_resolve(message: impl Into<String>) -> Self {
        Self::new(HookPhase::PreResolve, message)
    }

    /// Creates a new hook error for the post-resolve phase.
    pub fn post_resolve(message: impl Into<String>) -> Self {
        Self::new(HookPhase::PostResolve, message)
    }

    /// Creates a new hook error for the pre-render phase.
    pub fn pre_render(message: impl Into<String>) -> Self {
        Self::new(HookPhase::PreRender, message)
    }

    /// Creates a new hook error for the post-render phase.
    pub fn post_render(message: impl Into<String>) -> Self {
        Self::new(HookPhase::PostRender, message)
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.source = Some(source.into());
        self
    }
}

/// How a request ended, as reported to completion observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Rendered by the engine.
    Fresh,
    /// Served from a cache store.
    Cached,
    /// No candidate resolved.
    NotFound,
    /// The request returned an error.
    Failed,
}

/// Summary of a finished request, passed to completion observers.
#[derive(Debug, Clone)]
pub struct RenderEvent {
    pub candidates: Vec<String>,
    pub path: Option<PathBuf>,
    pub outcome: RenderOutcome,
}

/// Type alias for pre-resolve hook functions.
pub type PreResolveFn =
    Arc<dyn Fn(CallingContext) -> Result<CallingContext, HookError> + Send + Sync>;

/// Type alias for post-resolve hook functions.
pub type PostResolveFn = Arc<dyn Fn(PathBuf) -> Result<PathBuf, HookError> + Send + Sync>;

/// Type alias for pre-render hook functions.
pub type PreRenderFn =
    Arc<dyn Fn(&Path, serde_json::Value) -> Result<serde_json::Value, HookError> + Send + Sync>;

/// Type alias for post-render hook functions.
pub type PostRenderFn = Arc<dyn Fn(&Path, String) -> Result<String, HookError> + Send + Sync>;

/// Type alias for completion observers.
pub type CompletionFn = Arc<dyn Fn(&RenderEvent) + Send + Sync>;

/// Hook chains for a [`RenderPipeline`](crate::RenderPipeline).
///
/// ```rust
/// use stencil::{HookError, Hooks};
///
/// let hooks = Hooks::new()
///     .pre_render(|_path, mut data| {
///         data["site"] = "example.org".into();
///         Ok(data)
///     })
///     .post_render(|_path, output| Ok(output.trim().to_string()));
///
/// assert!(!hooks.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    pre_resolve: Vec<PreResolveFn>,
    post_resolve: Vec<PostResolveFn>,
    pre_render: Vec<PreRenderFn>,
    post_render: Vec<PostRenderFn>,
    on_complete: Vec<CompletionFn>,
}

impl Hooks {
    /// Creates a new empty hooks configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.pre_resolve.is_empty()
            && self.post_resolve.is_empty()
            && self.pre_render.is_empty()
            && self.post_render.is_empty()
            && self.on_complete.is_empty()
    }

    /// Adds a pre-resolve hook.
    pub fn pre_resolve<F>(mut self, f: F) -> Self
    where
        F: Fn(CallingContext) -> Result<CallingContext, HookError> + Send + Sync + 'static,
    {
        self.pre_resolve.push(Arc::new(f));
        self
    }

    /// Adds a post-resolve hook.
    pub fn post_resolve<F>(mut self, f: F) -> Self
    where
        F: Fn(PathBuf) -> Result<PathBuf, HookError> + Send + Sync + 'static,
    {
        self.post_resolve.push(Arc::new(f));
        self
    }

    /// Adds a pre-render hook.
    ///
    /// Runs before the cache key is derived, so the key always reflects the
    /// data the engine would see.
    pub fn pre_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, serde_json::Value) -> Result<serde_json::Value, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.pre_render.push(Arc::new(f));
        self
    }

    /// Adds a post-render hook.
    pub fn post_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, String) -> Result<String, HookError> + Send + Sync + 'static,
    {
        self.post_render.push(Arc::new(f));
        self
    }

    /// Adds a completion observer.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&RenderEvent) + Send + Sync + 'static,
    {
        self.on_complete.push(Arc::new(f));
        self
    }

    /// Runs all pre-resolve hooks, chaining transformations.
    pub fn run_pre_resolve(&self, calling: CallingContext) -> Result<CallingContext, HookError> {
        let mut current = calling;
        for hook in &self.pre_resolve {
            current = hook(current)?;
        }
        Ok(current)
    }

    /// Runs all post-resolve hooks, chaining transformations.
    pub fn run_post_resolve(&self, path: PathBuf) -> Result<PathBuf, HookError> {
        let mut current = path;
        for hook in &self.post_resolve {
            current = hook(current)?;
        }
        Ok(current)
    }

    /// Runs all pre-render hooks, chaining transformations.
    pub fn run_pre_render(
        &self,
        path: &Path,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, HookError> {
        let mut current = data;
        for hook in &self.pre_render {
            current = hook(path, current)?;
        }
        Ok(current)
    }

    /// Runs all post-render hooks, chaining transformations.
    pub fn run_post_render(&self, path: &Path, output: String) -> Result<String, HookError> {
        let mut current = output;
        for hook in &self.post_render {
            current = hook(path, current)?;
        }
        Ok(current)
    }

    /// Notifies every completion observer.
    pub fn run_complete(&self, event: &RenderEvent) {
        for observer in &self.on_complete {
            observer(event);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_resolve_count", &self.pre_resolve.len())
            .field("post_resolve_count", &self.post_resolve.len())
            .field("pre_render_count", &self.pre_render.len())
            .field("post_render_count", &self.post_render.len())
            .field("on_complete_count", &self.on_complete.len())
            .finish()
    }
}
