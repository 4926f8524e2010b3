//! Status board and one-line status summaries.

use crate::error::Result;
use crate::model::{Backlog, StoryId};
use crate::tools::store::ArtifactStore;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Status board document.
pub const BOARD_PATH: &str = "docs/status/board.md";

const MAX_SHOWN: usize = 3;
const MAX_PATH_CHARS: usize = 40;

/// Board fields to change on one story; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub phase: Option<String>,
    pub owner: Option<String>,
    pub next_owner: Option<String>,
    pub gate: Option<String>,
}

/// Applies `update` to a story.
///
/// # Returns
///
/// `false` when the story is not in the backlog.
pub fn update_story_fields(backlog: &mut Backlog, story_id: StoryId, update: StatusUpdate) -> bool {
    let Some(story) = backlog.find_story_mut(story_id) else {
        return false;
    };
    if let Some(phase) = update.phase {
        story.phase = Some(phase);
    }
    if let Some(owner) = update.owner {
        story.owner = Some(owner);
    }
    if let Some(next_owner) = update.next_owner {
        story.next_owner = Some(next_owner);
    }
    if let Some(gate) = update.gate {
        story.gate = Some(gate);
    }
    true
}

/// Renders the status board table.
pub fn render_board(backlog: &Backlog) -> String {
    let mut out = String::from(
        "# Status Board\n\n| Epic | Story | Title | Phase | Owner | Next | Gate |\n|---|---:|---|---|---|---|---|\n",
    );
    for epic in &backlog.epics {
        for story in &epic.stories {
            let _ = writeln!(
                out,
                "| {} — {} | {} | {} | {} | {} | {} | {} |",
                epic.id,
                epic.title,
                story.id,
                story.title,
                story.phase.as_deref().unwrap_or("-"),
                story.owner.as_deref().unwrap_or("-"),
                story.next_owner.as_deref().unwrap_or("-"),
                story.gate.as_deref().unwrap_or("-"),
            );
        }
    }
    out
}

/// Writes the status board and returns its path.
pub fn write_board(store: &dyn ArtifactStore, backlog: &Backlog) -> Result<PathBuf> {
    let path = PathBuf::from(BOARD_PATH);
    store.write(&path, &render_board(backlog))?;
    Ok(path)
}

/// Formats a one-line progress summary.
///
/// Path lists show at most three entries, each cut to its last 40
/// characters.
pub fn format_status_line(
    phase: &str,
    role: &str,
    agents: &[String],
    created: &[String],
    referenced: &[String],
    gate: Option<&str>,
) -> String {
    let agents = if agents.is_empty() {
        "-".to_string()
    } else {
        agents.join(", ")
    };
    let mut line = format!(
        "[{phase}] {role} | Agents: {agents} | Docs +: {} | Ref: {}",
        shorten(created),
        shorten(referenced)
    );
    if let Some(gate) = gate {
        let _ = write!(line, " | Gate: {gate}");
    }
    line
}

fn shorten(paths: &[String]) -> String {
    if paths.is_empty() {
        return "-".to_string();
    }
    let shown = paths
        .iter()
        .take(MAX_SHOWN)
        .map(|path| tail(path, MAX_PATH_CHARS))
        .collect::<Vec<_>>()
        .join(", ");
    if paths.len() > MAX_SHOWN {
        format!("{shown}, +{} more", paths.len() - MAX_SHOWN)
    } else {
        shown
    }
}

fn tail(path: &str, max: usize) -> &str {
    let count = path.chars().count();
    if count < max {
        return path;
    }
    let skip = count - max;
    path.char_indices().nth(skip).map_or(path, |(i, _)| &path[i..])
}
