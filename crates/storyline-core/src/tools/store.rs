//! Artifact store trait.
//!
//! The store is the workflow's ledger: an artifact counts as done exactly
//! when its path exists. Paths are relative and resolve against the store
//! root, so the same workflow runs against a real project directory or an
//! in-memory map.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// A file found by [`ArtifactStore::list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the store root.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// Artifact store trait.
///
/// Defines every file operation the backlog workflow needs. Implementations
/// can be real ([`StdArtifactStore`](super::store_impl::StdArtifactStore))
/// or in-memory ([`MemoryArtifactStore`](super::store_memory::MemoryArtifactStore)).
pub trait ArtifactStore: Send + Sync {
    /// Checks if a path exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// Reads the contents of a file as a string.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::PathNotFound` if the file doesn't exist or
    /// `StorylineError::FileReadError` if reading fails.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Writes a file, creating parent directories and overwriting any
    /// existing content.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::PermissionDenied` if lacking write
    /// permissions or `StorylineError::FileWriteError` if writing fails.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Writes a file only if the path does not exist yet.
    ///
    /// The check and the write are one atomic step: of two concurrent
    /// callers at most one sees `true`.
    ///
    /// # Returns
    ///
    /// `true` if the file was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Same as [`ArtifactStore::write`].
    fn write_if_absent(&self, path: &Path, content: &str) -> Result<bool>;

    /// Appends to a file, creating it (and its parents) if missing.
    ///
    /// # Errors
    ///
    /// Same as [`ArtifactStore::write`].
    fn append(&self, path: &Path, content: &str) -> Result<()>;

    /// Lists every file below `dir`, recursively, sorted by path.
    ///
    /// Directories whose name `skip_dir` accepts are not entered. A missing
    /// `dir` yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::FileReadError` if a directory cannot be
    /// read.
    fn list_files(&self, dir: &Path, skip_dir: &dyn Fn(&str) -> bool) -> Result<Vec<FileEntry>>;
}
