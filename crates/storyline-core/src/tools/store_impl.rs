//! Filesystem-backed artifact store.

use crate::error::{Result, StorylineError};
use crate::tools::store::{ArtifactStore, FileEntry};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Artifact store rooted at a project directory.
///
/// Relative paths are joined onto `root`; absolute paths are used as-is.
#[derive(Debug, Clone)]
pub struct StdArtifactStore {
    root: PathBuf,
}

impl StdArtifactStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root this store resolves against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn ensure_parent(&self, full: &Path) -> Result<()> {
        if let Some(parent) = full.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }
        Ok(())
    }
}

fn write_error(path: &Path, e: std::io::Error) -> StorylineError {
    if e.kind() == ErrorKind::PermissionDenied {
        StorylineError::PermissionDenied(path.display().to_string())
    } else {
        StorylineError::FileWriteError(format!("{}: {}", path.display(), e))
    }
}

impl ArtifactStore for StdArtifactStore {
    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        std::fs::read_to_string(&full).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorylineError::PathNotFound(path.to_path_buf())
            } else {
                StorylineError::FileReadError(format!("{}: {}", full.display(), e))
            }
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        let full = self.resolve(path);
        self.ensure_parent(&full)?;
        std::fs::write(&full, content).map_err(|e| write_error(&full, e))
    }

    fn write_if_absent(&self, path: &Path, content: &str) -> Result<bool> {
        let full = self.resolve(path);
        self.ensure_parent(&full)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&full) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(write_error(&full, e)),
        };
        file.write_all(content.as_bytes())
            .map_err(|e| write_error(&full, e))?;
        Ok(true)
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        let full = self.resolve(path);
        self.ensure_parent(&full)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .map_err(|e| write_error(&full, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| write_error(&full, e))
    }

    fn list_files(&self, dir: &Path, skip_dir: &dyn Fn(&str) -> bool) -> Result<Vec<FileEntry>> {
        let mut files = Vec::new();
        let start = self.resolve(dir);
        if !start.is_dir() {
            return Ok(files);
        }

        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let entries = std::fs::read_dir(&current).map_err(|e| read_error(&current, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| read_error(&current, e))?;
                let path = entry.path();
                let file_type = entry.file_type().map_err(|e| read_error(&path, e))?;
                if file_type.is_dir() {
                    let name = entry.file_name();
                    if !skip_dir(&name.to_string_lossy()) {
                        stack.push(path);
                    }
                } else if file_type.is_file() {
                    let size = entry.metadata().map_or(0, |m| m.len());
                    let rel = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
                    files.push(FileEntry { path: rel, size });
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

fn read_error(path: &Path, e: std::io::Error) -> StorylineError {
    StorylineError::FileReadError(format!("{}: {}", path.display(), e))
}
