//! In-memory artifact store.
//!
//! Backs tests and dry runs. Clones share the same underlying map, so a
//! test can hand one clone to the engine and inspect another.

use crate::error::{Result, StorylineError};
use crate::tools::store::{ArtifactStore, FileEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

impl Inner {
    fn add_parents(&mut self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }
}

/// In-memory artifact store.
///
/// # Examples
///
/// ```
/// use storyline_core::tools::store::ArtifactStore;
/// use storyline_core::tools::store_memory::MemoryArtifactStore;
/// use std::path::Path;
///
/// let store = MemoryArtifactStore::new();
/// assert!(store.write_if_absent(Path::new("docs/ux/story-1.md"), "# UX").unwrap());
/// assert!(store.exists(Path::new("docs/ux")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `(path, content)` pairs.
    pub fn with_files<I, P, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for (path, content) in files {
                let path = path.into();
                inner.add_parents(&path);
                inner.files.insert(path, content.into());
            }
        }
        store
    }

    /// Returns all file paths, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    /// Removes a file, returning whether it existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.lock().files.remove(path).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn exists(&self, path: &Path) -> bool {
        let inner = self.lock();
        inner.files.contains_key(path) || inner.dirs.contains(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StorylineError::PathNotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.add_parents(path);
        inner.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn write_if_absent(&self, path: &Path, content: &str) -> Result<bool> {
        let mut inner = self.lock();
        if inner.files.contains_key(path) || inner.dirs.contains(path) {
            return Ok(false);
        }
        inner.add_parents(path);
        inner.files.insert(path.to_path_buf(), content.to_string());
        Ok(true)
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.add_parents(path);
        inner
            .files
            .entry(path.to_path_buf())
            .or_default()
            .push_str(content);
        Ok(())
    }

    fn list_files(&self, dir: &Path, skip_dir: &dyn Fn(&str) -> bool) -> Result<Vec<FileEntry>> {
        let inner = self.lock();
        let files = inner
            .files
            .iter()
            .filter_map(|(path, content)| {
                let rel = path.strip_prefix(dir).ok()?;
                let skipped = rel
                    .parent()
                    .into_iter()
                    .flat_map(Path::components)
                    .any(|c| skip_dir(&c.as_os_str().to_string_lossy()));
                (!skipped).then(|| FileEntry {
                    path: path.clone(),
                    size: content.len() as u64,
                })
            })
            .collect();
        Ok(files)
    }
}
