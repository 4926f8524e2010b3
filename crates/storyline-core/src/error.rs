//! Error types for Storyline operations.
//!
//! Fatal-input failures (missing backlog, unknown story, missing PRD) are
//! variants here and halt the operation. Malformed auxiliary data such as a
//! broken risk record never reaches this type: the gate reports it as an
//! issue instead.

use std::path::PathBuf;
use thiserror::Error;

/// Error types for Storyline operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StorylineError {
    // Backlog errors
    /// No backlog store exists yet.
    #[error("no backlog found at {0} - run `storyline plan <prd>` first")]
    BacklogNotFound(PathBuf),

    /// Backlog store exists but cannot be decoded.
    #[error("corrupted backlog {path}: {reason}")]
    CorruptedBacklog {
        /// Path of the backlog document.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// Story id is not present in the backlog.
    #[error("story {0} not found")]
    StoryNotFound(u32),

    /// Story estimate must be a positive number of points.
    #[error("invalid estimate for story {story_id}: {value}")]
    InvalidEstimate {
        /// Story the estimate was given for.
        story_id: u32,
        /// Rejected value.
        value: f64,
    },

    /// PRD document does not exist.
    #[error("PRD not found: {0}")]
    PrdNotFound(PathBuf),

    // State errors
    /// State record exists but cannot be decoded.
    #[error("corrupted state file: {0}")]
    CorruptedState(PathBuf),

    /// Unknown phase name.
    #[error("invalid phase: {0} (expected assess, develop or sustain)")]
    InvalidPhase(String),

    // File system errors
    /// Path not found in the artifact store.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// Permission denied for the specified path.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Error reading file.
    #[error("file read error: {0}")]
    FileReadError(String),

    /// Error writing file.
    #[error("file write error: {0}")]
    FileWriteError(String),

    // Config errors
    /// Error parsing configuration file.
    #[error("config parse error: {0}")]
    ConfigParseError(String),

    /// Configuration value out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // Template errors
    /// Artifact template failed to load or render.
    #[error(transparent)]
    Template(#[from] storyline_templates::TemplateError),

    // Collaborator errors
    /// External command could not be started.
    #[error("shell command failed: {0}")]
    ShellCommandFailed(String),

    /// External command exceeded its time budget.
    #[error("command timed out after {0}s")]
    CommandTimeout(u64),

    // IO and serialization
    /// Standard IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode or decode error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context from anyhow.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for Storyline operations.
pub type Result<T> = std::result::Result<T, StorylineError>;
