//! The render pipeline.
//!
//! [`RenderPipeline`] ties the pieces together for one request:
//!
//! ```text
//! pre-resolve hook → Locator::build → Resolver::resolve ──(none)──→ NotFound
//!                                         │
//!                    post-resolve hook ←──┘
//!                    pre-render hook
//!                    CachePolicy::decide / key
//!                    CacheStore::get ──(hit)──→ post-render hook → Cached
//!                    read + compile + render
//!                    CacheStore::set
//!                    post-render hook → Fresh
//! ```
//!
//! Cache faults never fail a request. A read error is a miss, a write error
//! is logged and dropped. Engine and I/O errors always fail the request and
//! nothing is stored for it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use stencil_cache::{
    CacheKey, CacheMode, CachePolicy, CacheStore, MemoryStore, StoreError, StoreKind, Ttl,
};

use crate::engine::{EngineError, MiniJinjaEngine, TemplateEngine};
use crate::error::RenderError;
use crate::fs::{FileSystem, RealFs};
use crate::hooks::{Hooks, RenderEvent, RenderOutcome};
use crate::location::{LocationChain, Locator};
use crate::request::TemplateRequest;
use crate::resolver::{ResolvedFile, Resolver};

/// Result of a render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Produced by the engine for this request.
    Fresh(String),
    /// Served from a cache store.
    Cached(String),
    /// No candidate name resolved to a file.
    NotFound,
}

impl Rendered {
    /// Returns the output, or `None` for [`Rendered::NotFound`].
    pub fn into_output(self) -> Option<String> {
        match self {
            Rendered::Fresh(s) | Rendered::Cached(s) => Some(s),
            Rendered::NotFound => None,
        }
    }

    /// Borrows the output.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Rendered::Fresh(s) | Rendered::Cached(s) => Some(s),
            Rendered::NotFound => None,
        }
    }

    /// Returns true if the output came from a cache store.
    pub fn is_cached(&self) -> bool {
        matches!(self, Rendered::Cached(_))
    }

    /// Returns true unless no template was found.
    pub fn is_found(&self) -> bool {
        !matches!(self, Rendered::NotFound)
    }

    fn outcome(&self) -> RenderOutcome {
        match self {
            Rendered::Fresh(_) => RenderOutcome::Fresh,
            Rendered::Cached(_) => RenderOutcome::Cached,
            Rendered::NotFound => RenderOutcome::NotFound,
        }
    }
}

/// Resolves, caches and renders templates.
///
/// Cheap to share: wrap it in an `Arc` and call [`render`](Self::render)
/// from any thread.
///
/// ```rust
/// use stencil::{CacheMode, CachePolicy, MemoryStore, RenderPipeline, TemplateRequest, Ttl};
/// use stencil::fs::MemoryFs;
/// use stencil::{LocationRegistry, Locator};
/// use serde_json::json;
///
/// let pipeline = RenderPipeline::builder()
///     .locator(Locator::new(LocationRegistry::from_paths(["/views"])))
///     .filesystem(MemoryFs::new().with_file("/views/hello.tmpl", "Hello {{ name }}"))
///     .policy(CachePolicy::new(CacheMode::Object, Ttl::from_secs(60)))
///     .store(MemoryStore::new())
///     .build();
///
/// let request = TemplateRequest::new(["hello.tmpl"]).data(json!({"name": "you"}));
/// assert_eq!(pipeline.fetch(&request).unwrap().as_deref(), Some("Hello you"));
/// assert!(pipeline.render(&request).unwrap().is_cached());
/// ```
pub struct RenderPipeline {
    locator: Locator,
    resolver: Resolver<Arc<dyn FileSystem>>,
    policy: CachePolicy,
    store: Arc<dyn CacheStore>,
    engine: Arc<dyn TemplateEngine>,
    hooks: Hooks,
}

impl RenderPipeline {
    /// Starts building a pipeline.
    pub fn builder() -> RenderPipelineBuilder {
        RenderPipelineBuilder::new()
    }

    /// Renders a request.
    ///
    /// Completion observers run once per call, whatever the outcome.
    pub fn render(&self, request: &TemplateRequest) -> Result<Rendered, RenderError> {
        let mut path = None;
        let result = self.run(request, &mut path);

        let outcome = match &result {
            Ok(rendered) => rendered.outcome(),
            Err(_) => RenderOutcome::Failed,
        };
        self.hooks.run_complete(&RenderEvent {
            candidates: request.candidates().to_vec(),
            path,
            outcome,
        });

        result
    }

    /// Renders a request and returns just the output.
    pub fn fetch(&self, request: &TemplateRequest) -> Result<Option<String>, RenderError> {
        self.render(request).map(Rendered::into_output)
    }

    /// Renders an inline template string.
    ///
    /// No resolution, caching or hooks are involved. `null` data is treated
    /// as an empty mapping.
    pub fn render_string(&self, source: &str, data: &Value) -> Result<String, RenderError> {
        let empty = Value::Object(Default::default());
        let data = if data.is_null() { &empty } else { data };
        self.engine
            .render_str(source, data)
            .map_err(RenderError::Inline)
    }

    /// Resolves candidates for a request without rendering.
    pub fn resolve(&self, request: &TemplateRequest) -> Result<Option<ResolvedFile>, RenderError> {
        let chain = self.chain_for(request)?;
        Ok(self.resolver.resolve(request.candidates(), &chain))
    }

    /// Drops every entry in one store namespace.
    pub fn clear_cache(&self, kind: StoreKind) -> Result<(), StoreError> {
        tracing::debug!(%kind, "clearing cache namespace");
        self.store.clear(kind)
    }

    /// Registers an extra template directory at runtime.
    ///
    /// Returns `false` if it was already registered.
    pub fn register_location(&self, dir: impl Into<PathBuf>) -> bool {
        self.locator.registry().register(dir)
    }

    /// The locator that builds each request's chain.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// The cache policy applied to every request.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// The installed hook chains.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    fn chain_for(&self, request: &TemplateRequest) -> Result<LocationChain, RenderError> {
        let calling = self.hooks.run_pre_resolve(request.calling().clone())?;
        Ok(self.locator.build(&calling))
    }

    fn run(
        &self,
        request: &TemplateRequest,
        seen_path: &mut Option<PathBuf>,
    ) -> Result<Rendered, RenderError> {
        let chain = self.chain_for(request)?;
        let Some(resolved) = self.resolver.resolve(request.candidates(), &chain) else {
            return Ok(Rendered::NotFound);
        };

        let path = self.hooks.run_post_resolve(resolved.path)?;
        *seen_path = Some(path.clone());

        let data = self
            .hooks
            .run_pre_render(&path, request.context_data().clone())?;

        let decision = self
            .policy
            .decide(request.mode(), request.expires_override());
        let slot = decision
            .store_kind
            .map(|kind| (kind, self.policy.key(&path, &data, request.mode())));

        if decision.should_read {
            if let Some((kind, key)) = &slot {
                if let Some(hit) = self.read_cached(*kind, key) {
                    let output = self.hooks.run_post_render(&path, hit)?;
                    return Ok(Rendered::Cached(output));
                }
            }
        }

        let output = self.render_file(&path, &data)?;

        if decision.should_write {
            if let Some((kind, key)) = &slot {
                self.write_cached(*kind, key, &output, decision.ttl);
            }
        }

        let output = self.hooks.run_post_render(&path, output)?;
        Ok(Rendered::Fresh(output))
    }

    fn render_file(&self, path: &Path, data: &Value) -> Result<String, RenderError> {
        let source = self
            .resolver
            .fs()
            .read_to_string(path)
            .map_err(|source| RenderError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let engine_err = |source: EngineError| RenderError::Engine {
            path: path.to_path_buf(),
            source,
        };
        let template = self
            .engine
            .compile(&path.display().to_string(), &source)
            .map_err(engine_err)?;
        let output = template.render(data).map_err(engine_err)?;

        tracing::debug!(path = %path.display(), bytes = output.len(), "rendered template");
        Ok(output)
    }

    fn read_cached(&self, kind: StoreKind, key: &CacheKey) -> Option<String> {
        match self.store.get(kind, key) {
            Ok(Some(value)) => {
                tracing::debug!(%kind, %key, "cache hit");
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(%kind, %key, "cache miss");
                None
            }
            Err(err) => {
                tracing::warn!(%kind, %key, error = %err, "cache read failed, rendering uncached");
                None
            }
        }
    }

    fn write_cached(&self, kind: StoreKind, key: &CacheKey, value: &str, ttl: Ttl) {
        match self.store.set(kind, key, value, ttl) {
            Ok(()) => tracing::debug!(%kind, %key, %ttl, "stored render"),
            Err(err) => {
                tracing::warn!(%kind, %key, error = %err, "cache write failed, output not stored")
            }
        }
    }
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("locator", &self.locator)
            .field("policy", &self.policy)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RenderPipeline`].
///
/// Every part has a default: an empty [`Locator`], the real filesystem,
/// [`CachePolicy::default`] (caching off), an in-memory store, a plain
/// [`MiniJinjaEngine`] and no hooks.
pub struct RenderPipelineBuilder {
    locator: Locator,
    fs: Arc<dyn FileSystem>,
    policy: CachePolicy,
    store: Arc<dyn CacheStore>,
    engine: Arc<dyn TemplateEngine>,
    hooks: Hooks,
}

impl RenderPipelineBuilder {
    /// Creates a builder with every part at its default.
    pub fn new() -> Self {
        Self {
            locator: Locator::default(),
            fs: Arc::new(RealFs),
            policy: CachePolicy::default(),
            store: Arc::new(MemoryStore::new()),
            engine: Arc::new(MiniJinjaEngine::new()),
            hooks: Hooks::new(),
        }
    }

    /// Sets the locator used to build location chains.
    pub fn locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }

    /// Sets the filesystem templates are read from.
    pub fn filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    /// Sets the cache policy.
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for a policy with the given default mode and the current TTL.
    pub fn default_mode(mut self, mode: CacheMode) -> Self {
        self.policy = CachePolicy::new(mode, self.policy.default_ttl());
        self
    }

    /// Sets the cache store.
    pub fn store(mut self, store: impl CacheStore + 'static) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Uses an already shared store, e.g. one also held by a test.
    pub fn shared_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the template engine.
    pub fn engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    /// Sets the hook chains.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Finishes the pipeline.
    pub fn build(self) -> RenderPipeline {
        RenderPipeline {
            locator: self.locator,
            resolver: Resolver::with_fs(self.fs),
            policy: self.policy,
            store: self.store,
            engine: self.engine,
            hooks: self.hooks,
        }
    }
}

impl Default for RenderPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CompiledTemplate;
    use crate::fs::MemoryFs;
    use crate::hooks::HookError;
    use crate::location::{CallingContext, LocationRegistry};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stencil_cache::testing::RecordingStore;

    /// Wraps an engine and counts compile calls.
    struct CountingEngine {
        inner: MiniJinjaEngine,
        compiles: Arc<AtomicUsize>,
    }

    impl TemplateEngine for CountingEngine {
        fn compile(
            &self,
            name: &str,
            source: &str,
        ) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            self.inner.compile(name, source)
        }
    }

    struct Fixture {
        pipeline: RenderPipeline,
        store: Arc<RecordingStore>,
        compiles: Arc<AtomicUsize>,
    }

    fn fixture(mode: CacheMode, hooks: Hooks) -> Fixture {
        let fs = MemoryFs::new()
            .with_file("/custom/only.tmpl", "custom")
            .with_file("/theme/index.tmpl", "Hello {{ name }}")
            .with_file("/default/index.tmpl", "default")
            .with_file("/default/special.tmpl", "special {{ name }}")
            .with_file("/default/broken.tmpl", "{% if %}");
        let store = Arc::new(RecordingStore::new());
        let compiles = Arc::new(AtomicUsize::new(0));

        let pipeline = RenderPipeline::builder()
            .locator(Locator::new(LocationRegistry::from_paths([
                "/custom", "/theme", "/default",
            ])))
            .filesystem(fs)
            .policy(CachePolicy::new(mode, Ttl::from_secs(3600)))
            .shared_store(store.clone())
            .engine(CountingEngine {
                inner: MiniJinjaEngine::new(),
                compiles: compiles.clone(),
            })
            .hooks(hooks)
            .build();

        Fixture {
            pipeline,
            store,
            compiles,
        }
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RenderPipeline>();
    }

    #[test]
    fn test_fresh_then_cached() {
        let f = fixture(CacheMode::Object, Hooks::new());
        let request = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "A"}));

        let first = f.pipeline.render(&request).unwrap();
        let second = f.pipeline.render(&request).unwrap();

        assert_eq!(first, Rendered::Fresh("Hello A".into()));
        assert_eq!(second, Rendered::Cached("Hello A".into()));
        assert_eq!(f.compiles.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.set_count(), 1);
        assert_eq!(f.store.hit_count(), 1);
    }

    #[test]
    fn test_none_mode_never_touches_store() {
        let f = fixture(CacheMode::None, Hooks::new());
        let request = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "A"}));

        f.pipeline.render(&request).unwrap();
        f.pipeline.render(&request).unwrap();

        assert_eq!(f.store.get_count(), 0);
        assert_eq!(f.store.set_count(), 0);
        assert_eq!(f.compiles.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_not_found_has_no_cache_access() {
        let f = fixture(CacheMode::Object, Hooks::new());
        let request = TemplateRequest::new(["missing.tmpl"]);

        assert_eq!(f.pipeline.render(&request).unwrap(), Rendered::NotFound);
        assert_eq!(f.pipeline.fetch(&request).unwrap(), None);
        assert_eq!(f.store.get_count(), 0);
        assert_eq!(f.compiles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_candidate_major_resolution() {
        let f = fixture(CacheMode::None, Hooks::new());
        let request =
            TemplateRequest::new(["special.tmpl", "index.tmpl"]).data(json!({"name": "B"}));
        assert_eq!(
            f.pipeline.fetch(&request).unwrap().as_deref(),
            Some("special B")
        );
    }

    #[test]
    fn test_engine_error_is_fatal_and_not_cached() {
        let f = fixture(CacheMode::Object, Hooks::new());
        let request = TemplateRequest::new(["broken.tmpl"]);

        let err = f.pipeline.render(&request).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Engine {
                source: EngineError::Compile { .. },
                ..
            }
        ));
        assert_eq!(f.store.set_count(), 0);
    }

    #[test]
    fn test_read_failure_is_a_miss() {
        let f = fixture(CacheMode::Transient, Hooks::new());
        let request = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "A"}));
        f.pipeline.render(&request).unwrap();

        f.store.fail_reads(true);
        let again = f.pipeline.render(&request).unwrap();
        assert_eq!(again, Rendered::Fresh("Hello A".into()));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let f = fixture(CacheMode::Object, Hooks::new());
        f.store.fail_writes(true);
        let request = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "A"}));

        assert!(f.pipeline.render(&request).is_ok());
        assert!(!f.pipeline.render(&request).unwrap().is_cached());
    }

    #[test]
    fn test_post_render_applies_to_cached_output() {
        let hooks = Hooks::new().post_render(|_, out| Ok(format!("<{out}>")));
        let f = fixture(CacheMode::Object, hooks);
        let request = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "A"}));

        assert_eq!(
            f.pipeline.render(&request).unwrap(),
            Rendered::Fresh("<Hello A>".into())
        );
        assert_eq!(
            f.pipeline.render(&request).unwrap(),
            Rendered::Cached("<Hello A>".into())
        );
        let (kind, key) = f.store.written_keys().remove(0);
        assert_eq!(
            f.store.inner().get(kind, &key).unwrap().as_deref(),
            Some("Hello A")
        );
    }

    #[test]
    fn test_post_resolve_redirect_reads_and_keys_new_path() {
        let hooks = Hooks::new().post_resolve(|path| {
            if path == Path::new("/theme/index.tmpl") {
                Ok(PathBuf::from("/default/special.tmpl"))
            } else {
                Ok(path)
            }
        });
        let f = fixture(CacheMode::Object, hooks);
        let request = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "R"}));

        assert_eq!(
            f.pipeline.render(&request).unwrap(),
            Rendered::Fresh("special R".into())
        );
        assert_eq!(
            f.pipeline.render(&request).unwrap(),
            Rendered::Cached("special R".into())
        );

        let policy = f.pipeline.policy();
        let redirected = policy.key(
            Path::new("/default/special.tmpl"),
            request.context_data(),
            request.mode(),
        );
        let original = policy.key(
            Path::new("/theme/index.tmpl"),
            request.context_data(),
            request.mode(),
        );
        assert_ne!(redirected, original);
        assert_eq!(
            f.store.written_keys(),
            vec![(StoreKind::Object, redirected)]
        );
    }

    #[test]
    fn test_pre_render_data_feeds_key() {
        let hooks = Hooks::new().pre_render(|_, mut data| {
            data["name"] = json!("hooked");
            Ok(data)
        });
        let f = fixture(CacheMode::Object, hooks);

        let a = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "A"}));
        let b = TemplateRequest::new(["index.tmpl"]).data(json!({"name": "B"}));
        assert_eq!(f.pipeline.fetch(&a).unwrap().as_deref(), Some("Hello hooked"));
        assert!(f.pipeline.render(&b).unwrap().is_cached());
    }

    #[test]
    fn test_hook_error_surfaces() {
        let hooks = Hooks::new().pre_resolve(|_| Err(HookError::pre_resolve("blocked")));
        let f = fixture(CacheMode::Object, hooks);

        let err = f
            .pipeline
            .render(&TemplateRequest::new(["index.tmpl"]))
            .unwrap_err();
        assert!(matches!(err, RenderError::Hook(_)));
    }

    #[test]
    fn test_pre_resolve_calling_context_joins_chain() {
        let hooks = Hooks::new().pre_resolve(|_| Ok(CallingContext::new("/plugin")));
        let fs = MemoryFs::new().with_file("/plugin/widget.tmpl", "widget");
        let pipeline = RenderPipeline::builder()
            .filesystem(fs)
            .hooks(hooks)
            .build();

        let out = pipeline.fetch(&TemplateRequest::new(["widget.tmpl"])).unwrap();
        assert_eq!(out.as_deref(), Some("widget"));
    }

    #[test]
    fn test_completion_sees_every_outcome() {
        let outcomes = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = outcomes.clone();
        let hooks = Hooks::new().on_complete(move |e| sink.lock().unwrap().push(e.outcome));
        let f = fixture(CacheMode::Object, hooks);

        let ok = TemplateRequest::new(["index.tmpl"]);
        f.pipeline.render(&ok).unwrap();
        f.pipeline.render(&ok).unwrap();
        f.pipeline.render(&TemplateRequest::new(["nope.tmpl"])).unwrap();
        f.pipeline
            .render(&TemplateRequest::new(["broken.tmpl"]))
            .unwrap_err();

        assert_eq!(
            *outcomes.lock().unwrap(),
            vec![
                RenderOutcome::Fresh,
                RenderOutcome::Cached,
                RenderOutcome::NotFound,
                RenderOutcome::Failed,
            ]
        );
    }

    #[test]
    fn test_render_string_bypasses_cache() {
        let f = fixture(CacheMode::Object, Hooks::new());
        let out = f
            .pipeline
            .render_string("{{ a }}+{{ b }}", &json!({"a": 1, "b": 2}))
            .unwrap();
        assert_eq!(out, "1+2");
        assert_eq!(f.pipeline.render_string("plain", &Value::Null).unwrap(), "plain");
        assert_eq!(f.store.get_count(), 0);
    }

    #[test]
    fn test_clear_cache_forces_rerender() {
        let f = fixture(CacheMode::Object, Hooks::new());
        let request = TemplateRequest::new(["index.tmpl"]);
        f.pipeline.render(&request).unwrap();

        f.pipeline.clear_cache(StoreKind::Object).unwrap();
        assert!(!f.pipeline.render(&request).unwrap().is_cached());
    }

    #[test]
    fn test_register_location_at_runtime() {
        let f = fixture(CacheMode::None, Hooks::new());
        assert!(!f.pipeline.register_location("/custom"));
        assert!(f.pipeline.register_location("/late"));
        assert_eq!(f.pipeline.locator().registry().len(), 4);
    }
}
