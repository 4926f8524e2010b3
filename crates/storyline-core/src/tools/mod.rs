//! Collaborator adapters and registry for Storyline workflows.
//!
//! The registry bundles the artifact store and the shell adapter. Both are
//! trait objects so the engine runs unchanged against a real project
//! directory or against in-memory fakes.

pub mod shell;
pub mod shell_impl;
pub mod shell_mock;
pub mod store;
pub mod store_impl;
pub mod store_memory;

use std::path::Path;
use std::sync::Arc;

/// Tool registry that owns the collaborator adapters.
pub struct ToolRegistry {
    /// Artifact store for every document the workflow reads or writes.
    pub store: Arc<dyn store::ArtifactStore>,

    /// Shell adapter for external scanners.
    pub shell: Arc<dyn shell::ShellAdapter>,
}

impl ToolRegistry {
    /// Creates a new tool registry with the provided adapters.
    ///
    /// # Arguments
    ///
    /// * `store` - Artifact store implementation.
    /// * `shell` - Shell adapter implementation.
    pub fn new(store: Arc<dyn store::ArtifactStore>, shell: Arc<dyn shell::ShellAdapter>) -> Self {
        Self { store, shell }
    }

    /// Creates a registry over the real filesystem rooted at `root`.
    pub fn standard(root: &Path) -> Self {
        Self::new(
            Arc::new(store_impl::StdArtifactStore::new(root)),
            Arc::new(shell_impl::StdShellAdapter::new()),
        )
    }

    /// Creates a registry over an in-memory store with no external programs.
    pub fn in_memory(store: store_memory::MemoryArtifactStore) -> Self {
        Self::new(Arc::new(store), Arc::new(shell_mock::MockShellAdapter::new()))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("store", &"Arc<dyn ArtifactStore>")
            .field("shell", &"Arc<dyn ShellAdapter>")
            .finish()
    }
}
