//! Error types for the template crate.

use std::path::PathBuf;

/// Errors that can occur while loading or rendering artifact templates.
#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    /// No embedded or override template exists with this name.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Template failed to parse or render.
    #[error("template render error: {0}")]
    TemplateRenderError(String),

    /// Override directory does not exist or is not a directory.
    #[error("template directory not found: {0}")]
    TemplateDirectoryNotFound(PathBuf),

    /// Override directory listing failed.
    #[error("failed to list templates in {path}")]
    TemplateListError {
        /// Path to the template directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;
