//! Backlog and state persistence over an [`ArtifactStore`].

use crate::error::{Result, StorylineError};
use crate::model::Backlog;
use crate::state::WorkflowState;
use crate::tools::store::ArtifactStore;
use anyhow::Context;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Reads the backlog store.
///
/// # Returns
///
/// `None` when no backlog has been written yet.
///
/// # Errors
///
/// Returns `StorylineError::CorruptedBacklog` if the document is not a valid
/// backlog.
pub fn read_backlog(store: &dyn ArtifactStore, path: &Path) -> Result<Option<Backlog>> {
    if !store.exists(path) {
        return Ok(None);
    }

    let text = store.read_to_string(path)?;
    let backlog = Backlog::from_json(&text).map_err(|e| StorylineError::CorruptedBacklog {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Some(backlog))
}

/// Reads the backlog store, failing when it is absent.
///
/// # Errors
///
/// Returns `StorylineError::BacklogNotFound` when no backlog exists, plus
/// everything [`read_backlog`] returns.
pub fn require_backlog(store: &dyn ArtifactStore, path: &Path) -> Result<Backlog> {
    read_backlog(store, path)?.ok_or_else(|| StorylineError::BacklogNotFound(path.to_path_buf()))
}

/// Writes the backlog store, replacing any previous content.
pub fn write_backlog(store: &dyn ArtifactStore, path: &Path, backlog: &Backlog) -> Result<()> {
    store.write(path, &backlog.to_json()?)?;
    debug!(path = %path.display(), stories = backlog.story_count(), "Backlog written");
    Ok(())
}

/// Writes the human-readable epics list.
pub fn write_epics_markdown(
    store: &dyn ArtifactStore,
    path: &Path,
    backlog: &Backlog,
) -> Result<()> {
    store
        .write(path, &render_epics_markdown(backlog))
        .with_context(|| format!("failed to write epics list {}", path.display()))?;
    Ok(())
}

fn render_epics_markdown(backlog: &Backlog) -> String {
    let mut out = String::from("# Epics and Stories\n");
    for epic in &backlog.epics {
        let _ = write!(out, "\n## {}. {}\n\n", epic.id, epic.title);
        if !epic.description.is_empty() {
            let _ = writeln!(out, "{}\n", epic.description);
        }
        for story in &epic.stories {
            let estimate = story
                .estimate
                .map_or_else(|| "-".to_string(), |e| e.to_string());
            let _ = writeln!(out, "- Story {}: {}", story.id, story.title);
            let _ = writeln!(out, "  - Priority: {}", story.priority);
            let _ = writeln!(out, "  - Estimate: {estimate}");
            out.push_str("  - Acceptance Criteria:\n");
            if story.acceptance_criteria.is_empty() {
                out.push_str("    - TBD\n");
            }
            for criterion in &story.acceptance_criteria {
                let _ = writeln!(out, "    - {criterion}");
            }
        }
    }
    out
}

/// Reads the workflow state record.
///
/// # Returns
///
/// `None` when no record exists yet.
///
/// # Errors
///
/// Returns `StorylineError::CorruptedState` if the record does not parse.
pub fn read_state(store: &dyn ArtifactStore, path: &Path) -> Result<Option<WorkflowState>> {
    if !store.exists(path) {
        return Ok(None);
    }
    let text = store.read_to_string(path)?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|_| StorylineError::CorruptedState(path.to_path_buf()))
}

/// Writes the workflow state record.
pub fn write_state(store: &dyn ArtifactStore, path: &Path, state: &WorkflowState) -> Result<()> {
    store.write(path, &serde_json::to_string_pretty(state)?)
}
