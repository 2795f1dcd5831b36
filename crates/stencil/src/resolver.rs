//! Template resolution over a location chain.
//!
//! The [`Resolver`] turns a list of candidate names into a single file. The
//! search is candidate-major: every directory is tried for the first name
//! before any directory is tried for the second.
//!
//! ```text
//! candidates: ["special.tmpl", "index.tmpl"]
//! chain:      ["/custom", "/theme", "/default"]
//!
//! /custom/special.tmpl   ✗
//! /theme/special.tmpl    ✗
//! /default/special.tmpl  ✓  ← wins, even though /theme/index.tmpl exists
//! ```
//!
//! This lets a caller offer a preferred name with fallbacks while each name
//! still respects directory precedence.
//!
//! # Candidate Names
//!
//! - Names with separators (`"partials/nav.tmpl"`) are relative sub-paths.
//! - Absolute names are tested once, as-is, at their place in the order.
//! - Empty names are skipped.
//!
//! No traversal sanitization happens here; callers that accept names from
//! untrusted input must sanitize them first.

use std::path::{Path, PathBuf};

use crate::fs::{FileSystem, RealFs};
use crate::location::LocationChain;

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Path of the file that was found
    pub path: PathBuf,
    /// Chain directory it was found in; `None` for absolute candidates
    pub location: Option<PathBuf>,
    /// The candidate name that matched
    pub candidate: String,
}

impl ResolvedFile {
    /// Returns the resolved path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Finds the first existing file for a list of candidate names.
#[derive(Debug, Clone, Default)]
pub struct Resolver<F = RealFs> {
    fs: F,
}

impl Resolver<RealFs> {
    /// Creates a resolver over the real filesystem.
    pub fn new() -> Self {
        Self { fs: RealFs }
    }
}

impl<F: FileSystem> Resolver<F> {
    /// Creates a resolver over a custom filesystem.
    pub fn with_fs(fs: F) -> Self {
        Self { fs }
    }

    /// Returns the filesystem used for existence checks.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Resolves candidates against a chain.
    ///
    /// Returns `None` when no combination exists. Directories that do not
    /// exist are skipped without error.
    pub fn resolve<S: AsRef<str>>(
        &self,
        candidates: &[S],
        chain: &LocationChain,
    ) -> Option<ResolvedFile> {
        for candidate in candidates {
            let name = candidate.as_ref();
            if name.is_empty() {
                continue;
            }

            let relative = Path::new(name);
            if relative.is_absolute() {
                if self.fs.is_file(relative) {
                    return Some(ResolvedFile {
                        path: relative.to_path_buf(),
                        location: None,
                        candidate: name.to_string(),
                    });
                }
                continue;
            }

            for dir in chain.iter() {
                let path = dir.join(relative);
                if self.fs.is_file(&path) {
                    tracing::debug!(
                        candidate = name,
                        path = %path.display(),
                        "resolved template"
                    );
                    return Some(ResolvedFile {
                        path,
                        location: Some(dir.to_path_buf()),
                        candidate: name.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            candidates = ?candidates.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            locations = chain.len(),
            "no template found"
        );
        None
    }
}
