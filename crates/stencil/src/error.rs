//! Error types for rendering and configuration.
//!
//! [`RenderError`] is what [`RenderPipeline::render`](crate::RenderPipeline::render)
//! returns. A template that cannot be found is not an error; it is
//! [`Rendered::NotFound`](crate::Rendered::NotFound). Cache faults never show
//! up here either: they are logged and the request carries on uncached.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;
use crate::hooks::HookError;

/// Error type for a render request.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine failed to compile or render the template.
    #[error("template error in {}: {source}", .path.display())]
    Engine {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// An inline template failed to compile or render.
    #[error("inline template error: {0}")]
    Inline(#[source] EngineError),

    /// The resolved file could not be read.
    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A hook aborted the request.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Caller data could not be turned into a context value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RenderError {
    /// Returns the template path involved, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            RenderError::Engine { path, .. } | RenderError::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Error loading a [`StencilConfig`](crate::StencilConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}
