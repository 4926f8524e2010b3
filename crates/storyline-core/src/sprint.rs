//! Capacity-bounded sprint planning.

use crate::error::Result;
use crate::model::{Backlog, Priority, Story};
use crate::tools::store::ArtifactStore;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

/// Directory holding sprint documents.
pub const SPRINTS_DIR: &str = "docs/sprints";

/// One delivery batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintBatch {
    /// 1-based sprint number.
    pub number: usize,
    pub stories: Vec<Story>,
    /// Sum of story points in the batch.
    pub points: f64,
}

impl SprintBatch {
    fn new(number: usize) -> Self {
        Self {
            number,
            stories: Vec::new(),
            points: 0.0,
        }
    }

    /// Path of this sprint's document.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(format!("{SPRINTS_DIR}/sprint-{}.md", self.number))
    }
}

/// Packs the backlog into sprints of at most `capacity` points.
///
/// Stories are ordered by priority (must, should, could), keeping backlog
/// order within a priority, and added greedily. A story that does not fit
/// closes the current sprint; a story larger than `capacity` gets a sprint
/// of its own.
#[tracing::instrument(skip(backlog), fields(stories = backlog.story_count()))]
pub fn plan_sprints(backlog: &Backlog, capacity: f64) -> Vec<SprintBatch> {
    let ordered = Priority::ALL
        .iter()
        .flat_map(|priority| backlog.stories().filter(move |s| s.priority == *priority));

    let mut batches = Vec::new();
    let mut current = SprintBatch::new(1);
    for story in ordered {
        let points = story.points();
        if current.points + points > capacity && !current.stories.is_empty() {
            let next = SprintBatch::new(current.number + 1);
            batches.push(std::mem::replace(&mut current, next));
        }
        current.points += points;
        current.stories.push(story.clone());
    }
    if !current.stories.is_empty() {
        batches.push(current);
    }

    info!(sprints = batches.len(), "Sprints planned");
    batches
}

/// Writes one document per sprint plus the `plan.md` index.
///
/// # Returns
///
/// Paths written, sprint documents first.
pub fn write_sprint_plan(
    store: &dyn ArtifactStore,
    batches: &[SprintBatch],
    capacity: f64,
    weeks: u32,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(batches.len() + 1);
    let mut index = format!("# Sprint Plan (capacity={capacity}, length={weeks}w)\n\n");

    for batch in batches {
        let path = batch.path();
        store.write(&path, &render_sprint(batch, capacity))?;
        let _ = writeln!(
            index,
            "- Sprint {}: {}/{} -> {}",
            batch.number,
            batch.points,
            capacity,
            crate::paths::to_slash(&path)
        );
        written.push(path);
    }

    let index_path = PathBuf::from(format!("{SPRINTS_DIR}/plan.md"));
    store.write(&index_path, &index)?;
    written.push(index_path);
    Ok(written)
}

fn render_sprint(batch: &SprintBatch, capacity: f64) -> String {
    let mut out = format!(
        "# Sprint {}\n\nCapacity used: {}/{}\n\n## Stories\n",
        batch.number, batch.points, capacity
    );
    for story in &batch.stories {
        let _ = writeln!(out, "- Story {}: {} (pts={})", story.id, story.title, story.points());
    }
    out
}
