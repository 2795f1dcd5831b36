//! Location chains: the ordered directories searched for templates.
//!
//! A [`LocationChain`] is computed per request by a [`Locator`] from four
//! sources, in precedence order:
//!
//! 1. Custom locations registered in a [`LocationRegistry`]
//! 2. The [`CallingContext`] directory
//! 3. The theme hierarchy (active theme, then parent), each root expanded
//!    into its view sub-directories followed by the root itself
//! 4. The bundled default directory
//!
//! ```text
//! /srv/app/custom              ← registered
//! /srv/app/src/pages           ← calling context
//! /srv/themes/child/views      ← active theme, view dir
//! /srv/themes/child            ← active theme root
//! /srv/themes/base/views       ← parent theme, view dir
//! /srv/themes/base             ← parent theme root
//! /usr/share/stencil/views     ← bundled default
//! ```
//!
//! Directories are deduplicated keeping the first occurrence. Nothing here
//! touches the filesystem: directories that do not exist stay in the chain and
//! are skipped later by the [`Resolver`](crate::Resolver).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

/// The directory of the code that issued a render request.
///
/// Used as a search anchor so callers can keep templates next to the code
/// that renders them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallingContext(Option<PathBuf>);

impl CallingContext {
    /// A context with no anchor directory.
    pub fn none() -> Self {
        Self(None)
    }

    /// A context anchored at `dir`.
    ///
    /// An empty path is treated as no anchor.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            Self(None)
        } else {
            Self(Some(dir))
        }
    }

    /// A context anchored at the directory containing `file`.
    pub fn from_source_file(file: impl AsRef<Path>) -> Self {
        match file.as_ref().parent() {
            Some(parent) => Self::new(parent),
            None => Self(None),
        }
    }

    /// A context anchored at the directory of `file`, where `file` is a
    /// `file!()` path relative to `manifest_dir` or one of its ancestors.
    ///
    /// `file!()` is relative to the workspace root, which need not be the
    /// crate root, so the first ancestor under which `file` exists wins.
    /// Falls back to the relative parent when no ancestor matches.
    pub fn from_manifest_relative(manifest_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> Self {
        let file = file.as_ref();
        if file.is_absolute() {
            return Self::from_source_file(file);
        }
        let anchored = manifest_dir
            .as_ref()
            .ancestors()
            .map(|ancestor| ancestor.join(file))
            .find(|candidate| candidate.is_file());
        match anchored {
            Some(path) => Self::from_source_file(path),
            None => Self::from_source_file(file),
        }
    }

    /// Returns the anchor directory, if any.
    pub fn dir(&self) -> Option<&Path> {
        self.0.as_deref()
    }

    /// Returns true if there is no anchor directory.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// Builds a [`CallingContext`] for the source file this macro is invoked from.
///
/// The `file!()` path is anchored against the invoking crate's
/// `CARGO_MANIFEST_DIR`, so the result is absolute whenever the source tree
/// is still present at runtime.
///
/// ```rust
/// let ctx = stencil::calling_context!();
/// assert!(ctx.dir().is_some());
/// ```
#[macro_export]
macro_rules! calling_context {
    () => {
        $crate::CallingContext::from_manifest_relative(
            ::std::env!("CARGO_MANIFEST_DIR"),
            ::std::file!(),
        )
    };
}

/// Process-wide registry of custom template locations.
///
/// Registration is append-only and idempotent. Clones share the same list,
/// so a registry can be configured at startup and handed to any number of
/// pipelines. Reads take a shared lock; registration takes the write lock.
#[derive(Debug, Clone, Default)]
pub struct LocationRegistry {
    dirs: Arc<RwLock<Vec<PathBuf>>>,
}

impl LocationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from an initial list, dropping duplicates.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let registry = Self::new();
        registry.extend(paths);
        registry
    }

    /// Registers a location.
    ///
    /// Returns `false` if it was already registered, in which case nothing
    /// changes.
    pub fn register(&self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        let mut dirs = self.dirs.write();
        if dirs.contains(&dir) {
            return false;
        }
        tracing::debug!(location = %dir.display(), "registered template location");
        dirs.push(dir);
        true
    }

    /// Registers several locations in order.
    pub fn extend<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.register(path);
        }
    }

    /// Returns a copy of the registered locations in registration order.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.dirs.read().clone()
    }

    /// Returns true if `dir` is registered.
    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.read().iter().any(|d| d == dir)
    }

    /// Number of registered locations.
    pub fn len(&self) -> usize {
        self.dirs.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.dirs.read().is_empty()
    }
}

/// Theme directories supplied by the host environment.
pub trait ThemeHierarchy: Send + Sync {
    /// Theme root directories, most specific first (active, then parent).
    fn theme_roots(&self) -> Vec<PathBuf>;
}

/// A fixed active/parent theme pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticThemes {
    active: Option<PathBuf>,
    parent: Option<PathBuf>,
}

impl StaticThemes {
    /// No themes.
    pub fn none() -> Self {
        Self::default()
    }

    /// An explicit pair; either side may be absent.
    pub fn new(active: Option<PathBuf>, parent: Option<PathBuf>) -> Self {
        Self { active, parent }
    }

    /// A single active theme.
    pub fn active(dir: impl Into<PathBuf>) -> Self {
        Self {
            active: Some(dir.into()),
            parent: None,
        }
    }

    /// Sets the parent theme.
    pub fn with_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.parent = Some(dir.into());
        self
    }
}

impl ThemeHierarchy for StaticThemes {
    fn theme_roots(&self) -> Vec<PathBuf> {
        self.active
            .iter()
            .chain(self.parent.iter())
            .cloned()
            .collect()
    }
}

/// An ordered, duplicate-free list of directories.
///
/// Order is precedence: earlier directories win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationChain {
    dirs: Vec<PathBuf>,
}

impl LocationChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain from directories, dropping later duplicates.
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut chain = Self::new();
        for dir in dirs {
            chain.push(dir);
        }
        chain
    }

    /// Appends a directory unless it is already present.
    ///
    /// Returns true if the directory was added.
    pub fn push(&mut self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        if self.dirs.contains(&dir) {
            return false;
        }
        self.dirs.push(dir);
        true
    }

    /// Iterates directories in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    /// Returns the directories as a slice.
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Returns true if `dir` is part of the chain.
    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|d| d == dir)
    }

    /// Number of directories.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Returns true if the chain has no directories.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Consumes the chain, returning the directories.
    pub fn into_vec(self) -> Vec<PathBuf> {
        self.dirs
    }
}

impl<'a> IntoIterator for &'a LocationChain {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.dirs.iter()
    }
}

/// Computes location chains from the configured sources.
#[derive(Clone)]
pub struct Locator {
    registry: LocationRegistry,
    themes: Arc<dyn ThemeHierarchy>,
    view_dirs: Vec<String>,
    bundled: Option<PathBuf>,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(LocationRegistry::new())
    }
}

impl Locator {
    /// Creates a locator over a registry, with no themes and no bundled directory.
    pub fn new(registry: LocationRegistry) -> Self {
        Self {
            registry,
            themes: Arc::new(StaticThemes::none()),
            view_dirs: Vec::new(),
            bundled: None,
        }
    }

    /// Sets the theme hierarchy.
    pub fn with_themes(mut self, themes: impl ThemeHierarchy + 'static) -> Self {
        self.themes = Arc::new(themes);
        self
    }

    /// Sets the view sub-directories searched inside each theme root.
    pub fn with_view_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the bundled default directory.
    pub fn with_bundled(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled = Some(dir.into());
        self
    }

    /// Returns the registry this locator reads.
    pub fn registry(&self) -> &LocationRegistry {
        &self.registry
    }

    /// Builds the chain for a calling context.
    ///
    /// Never fails. With no sources configured the chain is empty.
    pub fn build(&self, calling: &CallingContext) -> LocationChain {
        let mut chain = LocationChain::from_dirs(self.registry.snapshot());

        if let Some(dir) = calling.dir() {
            chain.push(dir);
        }

        for root in self.themes.theme_roots() {
            for sub in &self.view_dirs {
                chain.push(root.join(sub));
            }
            chain.push(root);
        }

        if let Some(bundled) = &self.bundled {
            chain.push(bundled.clone());
        }

        tracing::trace!(locations = ?chain.as_slice(), "built location chain");
        chain
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("registry", &self.registry)
            .field("theme_roots", &self.themes.theme_roots())
            .field("view_dirs", &self.view_dirs)
            .field("bundled", &self.bundled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(chain: &LocationChain) -> Vec<&str> {
        chain.iter().map(|p| p.to_str().unwrap()).collect()
    }

    #[test]
    fn test_registry_is_idempotent() {
        let registry = LocationRegistry::new();
        assert!(registry.register("/a"));
        assert!(registry.register("/b"));
        assert!(!registry.register("/a"));
        assert_eq!(registry.snapshot(), vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_registry_clones_share_state() {
        let registry = LocationRegistry::new();
        let clone = registry.clone();
        clone.register("/late");
        assert!(registry.contains(Path::new("/late")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_full_precedence_order() {
        let locator = Locator::new(LocationRegistry::from_paths(["/custom"]))
            .with_themes(StaticThemes::active("/themes/child").with_parent("/themes/base"))
            .with_view_dirs(["views"])
            .with_bundled("/bundled");

        let chain = locator.build(&CallingContext::new("/caller"));

        assert_eq!(
            paths(&chain),
            vec![
                "/custom",
                "/caller",
                "/themes/child/views",
                "/themes/child",
                "/themes/base/views",
                "/themes/base",
                "/bundled",
            ]
        );
    }

    #[test]
    fn test_calling_context_deduplicated() {
        let locator = Locator::new(LocationRegistry::from_paths(["/shared", "/other"]));
        let chain = locator.build(&CallingContext::new("/shared"));
        assert_eq!(paths(&chain), vec!["/shared", "/other"]);
    }

    #[test]
    fn test_theme_same_as_caller_keeps_first() {
        let locator = Locator::default().with_themes(StaticThemes::active("/theme"));
        let chain = locator.build(&CallingContext::new("/theme"));
        assert_eq!(paths(&chain), vec!["/theme"]);
    }

    #[test]
    fn test_empty_context_and_no_sources() {
        let chain = Locator::default().build(&CallingContext::none());
        assert!(chain.is_empty());
    }

    #[test]
    fn test_empty_context_keeps_other_sources() {
        let locator = Locator::default().with_bundled("/bundled");
        let chain = locator.build(&CallingContext::new(""));
        assert_eq!(paths(&chain), vec!["/bundled"]);
    }

    #[test]
    fn test_nonexistent_directories_are_kept() {
        let locator = Locator::new(LocationRegistry::from_paths(["/no/such/dir"]));
        let chain = locator.build(&CallingContext::none());
        assert!(chain.contains(Path::new("/no/such/dir")));
    }

    #[test]
    fn test_late_registration_visible_to_next_build() {
        let registry = LocationRegistry::new();
        let locator = Locator::new(registry.clone());
        assert!(locator.build(&CallingContext::none()).is_empty());

        registry.register("/plugin/views");
        assert_eq!(
            paths(&locator.build(&CallingContext::none())),
            vec!["/plugin/views"]
        );
    }

    #[test]
    fn test_calling_context_from_source_file() {
        let ctx = CallingContext::from_source_file("/srv/app/src/page.rs");
        assert_eq!(ctx.dir(), Some(Path::new("/srv/app/src")));
        assert!(CallingContext::from_source_file("page.rs").is_none());
    }

    #[test]
    fn test_calling_context_macro_is_absolute() {
        let ctx = crate::calling_context!();
        let dir = ctx.dir().unwrap();
        assert!(dir.is_absolute());
        assert!(dir.join("location.rs").is_file());
    }

    #[test]
    fn test_manifest_relative_walks_ancestors() {
        let root = tempfile::tempdir().unwrap();
        let krate = root.path().join("crates/app");
        std::fs::create_dir_all(krate.join("src")).unwrap();
        std::fs::write(krate.join("src/main.rs"), "").unwrap();

        let ctx = CallingContext::from_manifest_relative(&krate, "crates/app/src/main.rs");
        assert_eq!(ctx.dir(), Some(krate.join("src").as_path()));
    }

    #[test]
    fn test_manifest_relative_falls_back_to_relative_parent() {
        let root = tempfile::tempdir().unwrap();
        let ctx = CallingContext::from_manifest_relative(root.path(), "gone/src/lib.rs");
        assert_eq!(ctx.dir(), Some(Path::new("gone/src")));
    }

    #[test]
    fn test_chain_from_dirs_dedups() {
        let chain = LocationChain::from_dirs(["/a", "/b", "/a"]);
        assert_eq!(chain.len(), 2);
    }
}
