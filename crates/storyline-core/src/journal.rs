//! Append-only audit journal.
//!
//! Each entry goes to a JSONL log under `.storyline/journal/` and as one
//! line to a markdown timeline under `docs/timeline/`. Nothing in the
//! workflow reads the journal back; it exists for people.

use crate::error::Result;
use crate::model::StoryId;
use crate::paths;
use crate::tools::store::ArtifactStore;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: String,
    pub phase: String,
    pub actor: String,
    pub action: String,
    pub story_id: Option<StoryId>,
    pub message: Option<String>,
    pub agents_used: Vec<String>,
    pub artifacts_created: Vec<String>,
    pub artifacts_referenced: Vec<String>,
    pub status: Option<String>,
    pub extra: Map<String, Value>,
}

impl JournalEntry {
    /// Creates an entry stamped with the current UTC time.
    pub fn now(phase: impl Into<String>, actor: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            phase: phase.into(),
            actor: actor.into(),
            action: action.into(),
            story_id: None,
            message: None,
            agents_used: Vec::new(),
            artifacts_created: Vec::new(),
            artifacts_referenced: Vec::new(),
            status: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn for_story(mut self, id: StoryId) -> Self {
        self.story_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, agents: Vec<String>, created: Vec<String>, referenced: Vec<String>) -> Self {
        self.agents_used = agents;
        self.artifacts_created = created;
        self.artifacts_referenced = referenced;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Journal scope name: `story-{id}` or `assess`.
    pub fn scope(&self) -> String {
        scope_name(self.story_id)
    }

    fn timeline_line(&self) -> String {
        format!(
            "- {} [{}] {}: {} ({})\n",
            self.timestamp,
            self.phase,
            self.actor,
            self.action,
            self.status.as_deref().unwrap_or("-")
        )
    }
}

fn scope_name(story_id: Option<StoryId>) -> String {
    match story_id {
        Some(id) => format!("story-{id}"),
        None => "assess".to_string(),
    }
}

fn timeline_header(story_id: Option<StoryId>) -> String {
    match story_id {
        Some(id) => format!("# Timeline — Story {id}\n\n"),
        None => "# Timeline — Assess\n\n".to_string(),
    }
}

/// Destination for journal entries.
pub trait JournalSink: Send + Sync {
    /// Appends one entry.
    fn record(&self, entry: &JournalEntry) -> Result<()>;
}

/// Journal written through an artifact store.
pub struct FileJournal {
    store: Arc<dyn ArtifactStore>,
    journal_dir: PathBuf,
}

impl FileJournal {
    pub fn new(store: Arc<dyn ArtifactStore>, journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            journal_dir: journal_dir.into(),
        }
    }
}

impl JournalSink for FileJournal {
    fn record(&self, entry: &JournalEntry) -> Result<()> {
        let scope = entry.scope();

        let log = paths::journal_file(&self.journal_dir, &scope);
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.store.append(&log, &line)?;

        let timeline = paths::timeline_file(&scope);
        self.store
            .write_if_absent(&timeline, &timeline_header(entry.story_id))?;
        self.store.append(&timeline, &entry.timeline_line())
    }
}

/// Journal that drops every entry.
#[derive(Debug, Default)]
pub struct NoopJournal;

impl JournalSink for NoopJournal {
    fn record(&self, _entry: &JournalEntry) -> Result<()> {
        Ok(())
    }
}

/// Reads the markdown timeline for a story, or the assess timeline.
pub fn read_timeline(store: &dyn ArtifactStore, story_id: Option<StoryId>) -> Result<Option<String>> {
    let path = paths::timeline_file(&scope_name(story_id));
    if !store.exists(&path) {
        return Ok(None);
    }
    store.read_to_string(&path).map(Some)
}

/// Reads and decodes the JSONL journal for a scope, skipping blank lines.
pub fn read_entries(store: &dyn ArtifactStore, journal_dir: &Path, story_id: Option<StoryId>) -> Result<Vec<JournalEntry>> {
    let path = paths::journal_file(journal_dir, &scope_name(story_id));
    if !store.exists(&path) {
        return Ok(Vec::new());
    }
    store
        .read_to_string(&path)?
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::store_memory::MemoryArtifactStore;
    use serde_json::json;

    const JOURNAL_DIR: &str = ".storyline/journal";

    fn journal(store: &MemoryArtifactStore) -> FileJournal {
        FileJournal::new(Arc::new(store.clone()), JOURNAL_DIR)
    }

    #[test]
    fn test_story_entry_written_twice() {
        let store = MemoryArtifactStore::new();
        let sink = journal(&store);
        let entry = JournalEntry::now("develop", "PM", "prepare_story")
            .for_story(3)
            .with_status("FAIL")
            .with_extra("issues", json!(["Acceptance criteria missing"]));

        sink.record(&entry).unwrap();
        sink.record(&entry).unwrap();

        let entries = read_entries(&store, Path::new(JOURNAL_DIR), Some(3)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry);

        let timeline = read_timeline(&store, Some(3)).unwrap().unwrap();
        assert!(timeline.starts_with("# Timeline — Story 3\n\n"));
        let line = format!("- {} [develop] PM: prepare_story (FAIL)", entry.timestamp);
        assert_eq!(timeline.matches(&line).count(), 2);
        assert_eq!(timeline.matches("# Timeline").count(), 1);
    }

    #[test]
    fn test_assess_entry_without_status() {
        let store = MemoryArtifactStore::new();
        journal(&store)
            .record(&JournalEntry::now("assess", "Analyst", "plan"))
            .unwrap();

        assert!(store.exists(Path::new(".storyline/journal/assess.jsonl")));
        let timeline = read_timeline(&store, None).unwrap().unwrap();
        assert!(timeline.starts_with("# Timeline — Assess"));
        assert!(timeline.trim_end().ends_with("[assess] Analyst: plan (-)"));
    }

    #[test]
    fn test_timestamp_is_utc_seconds() {
        let entry = JournalEntry::now("develop", "PM", "x");
        assert!(entry.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn test_noop_journal_writes_nothing() {
        NoopJournal
            .record(&JournalEntry::now("develop", "PM", "x").for_story(1))
            .unwrap();
    }

    #[test]
    fn test_missing_timeline() {
        let store = MemoryArtifactStore::new();
        assert!(read_timeline(&store, Some(9)).unwrap().is_none());
    }
}
