//! Filesystem abstractions for testability.
//!
//! Template resolution only needs two things from the filesystem: whether a
//! path is an existing file, and its contents. This module puts those behind
//! the [`FileSystem`] trait so resolution can be tested against an in-memory
//! tree without touching disk.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Abstraction over the filesystem operations used during resolution.
pub trait FileSystem: Send + Sync {
    /// Returns true if `path` exists and is a regular file.
    ///
    /// Missing parent directories are simply `false`, never an error.
    fn is_file(&self, path: &Path) -> bool;

    /// Reads a file to a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

impl<F: FileSystem + ?Sized> FileSystem for std::sync::Arc<F> {
    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }
}

// === Real implementation ===

/// The real filesystem, via `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

// === Mock implementation for testing ===

/// In-memory filesystem for testing.
///
/// Only files exist; directories are implied by file paths.
///
/// ```rust
/// use stencil::fs::{FileSystem, MemoryFs};
/// use std::path::Path;
///
/// let fs = MemoryFs::new().with_file("/theme/index.tmpl", "Hello");
/// assert!(fs.is_file(Path::new("/theme/index.tmpl")));
/// assert!(!fs.is_file(Path::new("/theme")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: HashMap<PathBuf, String>,
}

impl MemoryFs {
    /// Creates an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Adds or replaces a file in place.
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileSystem for MemoryFs {
    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}
