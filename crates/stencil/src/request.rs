//! Render requests.

use serde::Serialize;
use serde_json::{Map, Value};
use stencil_cache::CacheMode;

use crate::error::RenderError;
use crate::location::CallingContext;

/// One call to [`RenderPipeline::render`](crate::RenderPipeline::render).
///
/// ```rust
/// use stencil::{CacheMode, TemplateRequest};
/// use serde_json::json;
///
/// let request = TemplateRequest::new(["single.tmpl", "index.tmpl"])
///     .data(json!({"title": "Hello"}))
///     .expires(600)
///     .cache_mode(CacheMode::Transient);
///
/// assert_eq!(request.candidates(), ["single.tmpl", "index.tmpl"]);
/// assert_eq!(request.expires_override(), Some(600));
/// ```
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    candidates: Vec<String>,
    data: Value,
    expires: Option<i64>,
    cache_mode: CacheMode,
    calling: CallingContext,
}

impl TemplateRequest {
    /// Creates a request for the given candidate names, in preference order.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            data: Value::Object(Map::new()),
            expires: None,
            cache_mode: CacheMode::UseDefault,
            calling: CallingContext::none(),
        }
    }

    /// Sets the context data. `null` is treated as an empty mapping.
    pub fn data(mut self, data: Value) -> Self {
        self.data = match data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        self
    }

    /// Serializes caller data into the context.
    ///
    /// Fails with [`RenderError::Serialization`] if `data` has no JSON form,
    /// e.g. a map with non-string keys.
    pub fn with_data<T: Serialize + ?Sized>(self, data: &T) -> Result<Self, RenderError> {
        let value = serde_json::to_value(data)?;
        Ok(self.data(value))
    }

    /// Overrides the TTL in seconds. Zero or negative means never expire.
    pub fn expires(mut self, secs: i64) -> Self {
        self.expires = Some(secs);
        self
    }

    /// Sets the cache mode. Defaults to [`CacheMode::UseDefault`].
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Sets the directory of the code issuing the request.
    pub fn calling_context(mut self, calling: CallingContext) -> Self {
        self.calling = calling;
        self
    }

    /// Candidate names, in preference order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The context data passed to the template.
    pub fn context_data(&self) -> &Value {
        &self.data
    }

    /// The TTL override in seconds, if one was set.
    pub fn expires_override(&self) -> Option<i64> {
        self.expires
    }

    /// The requested cache mode.
    pub fn mode(&self) -> CacheMode {
        self.cache_mode
    }

    /// The calling context used as a search anchor.
    pub fn calling(&self) -> &CallingContext {
        &self.calling
    }
}
