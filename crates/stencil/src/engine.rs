//! Template engine abstraction.
//!
//! The pipeline only ever asks an engine two things: compile this source, and
//! render the compiled result with a context value. [`TemplateEngine`] and
//! [`CompiledTemplate`] are that seam. The default implementation is
//! [`MiniJinjaEngine`].

use std::fmt;
use std::sync::Arc;

use minijinja::{Environment, ErrorKind, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error raised by a template engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The template source could not be compiled.
    #[error("compile error{}: {message}", at_line(.line))]
    Compile { message: String, line: Option<usize> },

    /// The compiled template failed while rendering.
    #[error("render error: {message}")]
    Render { message: String },
}

fn at_line(line: &Option<usize>) -> String {
    line.map(|l| format!(" at line {l}")).unwrap_or_default()
}

impl EngineError {
    /// Creates a compile error without line information.
    pub fn compile(message: impl Into<String>) -> Self {
        EngineError::Compile {
            message: message.into(),
            line: None,
        }
    }

    /// Creates a render error.
    pub fn render(message: impl Into<String>) -> Self {
        EngineError::Render {
            message: message.into(),
        }
    }

    fn from_compile(err: minijinja::Error) -> Self {
        EngineError::Compile {
            line: err.line(),
            message: err.to_string(),
        }
    }

    fn from_render(err: minijinja::Error) -> Self {
        // Syntax problems in included templates only surface at render time.
        if err.kind() == ErrorKind::SyntaxError {
            return Self::from_compile(err);
        }
        EngineError::Render {
            message: err.to_string(),
        }
    }
}

/// A template ready to be rendered any number of times.
pub trait CompiledTemplate: Send + Sync {
    /// The name the template was compiled under.
    fn name(&self) -> &str;

    /// Renders the template with a context value.
    fn render(&self, data: &serde_json::Value) -> Result<String, EngineError>;
}

/// A template engine that can compile sources into [`CompiledTemplate`]s.
///
/// Implementations must be shareable across threads; the pipeline holds them
/// behind an `Arc`.
pub trait TemplateEngine: Send + Sync {
    /// Compiles `source` under `name`.
    ///
    /// `name` is used in error messages and, for engines that cache compiled
    /// templates, as part of the cache key.
    fn compile(&self, name: &str, source: &str) -> Result<Arc<dyn CompiledTemplate>, EngineError>;

    /// Compiles and renders in one step.
    fn render_str(&self, source: &str, data: &serde_json::Value) -> Result<String, EngineError> {
        self.compile("<inline>", source)?.render(data)
    }
}

impl<E: TemplateEngine + ?Sized> TemplateEngine for Arc<E> {
    fn compile(&self, name: &str, source: &str) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        (**self).compile(name, source)
    }

    fn render_str(&self, source: &str, data: &serde_json::Value) -> Result<String, EngineError> {
        (**self).render_str(source, data)
    }
}

/// Default capacity of the compiled-template cache.
pub const DEFAULT_COMPILE_CACHE_CAPACITY: u64 = 256;

/// Template name and hex SHA-256 of its source.
type CompileKey = (String, String);

/// MiniJinja-based template engine.
///
/// Each compiled template owns a snapshot of the engine's environment, so
/// filters and functions registered before compilation are available while
/// rendering.
///
/// # Example
///
/// ```rust
/// use stencil::{MiniJinjaEngine, TemplateEngine};
/// use serde_json::json;
///
/// let engine = MiniJinjaEngine::new();
/// let template = engine.compile("greeting", "Hello, {{ name }}!").unwrap();
/// assert_eq!(template.render(&json!({"name": "World"})).unwrap(), "Hello, World!");
/// ```
///
/// # Compiled Template Cache
///
/// With [`with_compile_cache`](Self::with_compile_cache), compiled templates
/// are kept in a bounded moka cache keyed by name and a digest of the source.
/// Editing a file changes its digest, so stale compilations are never served.
pub struct MiniJinjaEngine {
    env: Environment<'static>,
    compiled: Option<moka::sync::Cache<CompileKey, Arc<MiniJinjaTemplate>>>,
}

impl MiniJinjaEngine {
    /// Creates an engine with a default environment and no compile cache.
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
            compiled: None,
        }
    }

    /// Enables the compiled-template cache with the given capacity.
    pub fn with_compile_cache(mut self, capacity: u64) -> Self {
        self.compiled = Some(moka::sync::Cache::new(capacity));
        self
    }

    /// Returns whether compiled templates are cached.
    pub fn caches_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Returns a reference to the underlying MiniJinja environment.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Returns a mutable reference to the underlying MiniJinja environment.
    ///
    /// Use this to register filters, functions or a loader for includes.
    /// Cached compilations are dropped, since they captured the old
    /// environment.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        if let Some(cache) = &self.compiled {
            cache.invalidate_all();
        }
        &mut self.env
    }

    fn compile_uncached(&self, name: &str, source: &str) -> Result<MiniJinjaTemplate, EngineError> {
        let mut env = self.env.clone();
        env.add_template_owned(name.to_string(), source.to_string())
            .map_err(EngineError::from_compile)?;
        Ok(MiniJinjaTemplate {
            name: name.to_string(),
            env,
        })
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MiniJinjaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaEngine")
            .field("compile_cache", &self.compiled.as_ref().map(|c| c.entry_count()))
            .finish()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn compile(&self, name: &str, source: &str) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        let Some(cache) = &self.compiled else {
            return Ok(Arc::new(self.compile_uncached(name, source)?));
        };

        let key = (name.to_string(), source_digest(source));
        if let Some(hit) = cache.get(&key) {
            tracing::trace!(name, "compiled template cache hit");
            return Ok(hit);
        }

        let template = Arc::new(self.compile_uncached(name, source)?);
        cache.insert(key, Arc::clone(&template));
        Ok(template)
    }
}

fn source_digest(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// A template compiled by [`MiniJinjaEngine`].
#[derive(Debug)]
pub struct MiniJinjaTemplate {
    name: String,
    env: Environment<'static>,
}

impl CompiledTemplate for MiniJinjaTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, data: &serde_json::Value) -> Result<String, EngineError> {
        let template = self
            .env
            .get_template(&self.name)
            .map_err(EngineError::from_render)?;
        template
            .render(Value::from_serialize(data))
            .map_err(EngineError::from_render)
    }
}
