//! Workflow cursor persisted between CLI invocations.
//!
//! Tracks which story is in flight, the active delivery phase and the role
//! currently driving it. The record lives at `.storyline/state.json` and is
//! created with defaults on first use.

use crate::error::{Result, StorylineError};
use crate::model::StoryId;
use crate::storage;
use crate::tools::store::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Persisted workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Story currently being worked, if any.
    #[serde(default)]
    pub current_story_id: Option<StoryId>,

    /// Delivery phase.
    #[serde(default)]
    pub phase: Phase,

    /// Role driving the current phase.
    #[serde(default = "default_role")]
    pub active_role: String,

    /// Backlog store path.
    #[serde(default = "default_backlog_path")]
    pub backlog_path: String,

    /// UX artifact directory.
    #[serde(default = "default_ux_dir")]
    pub ux_dir: String,

    /// Scaffold directory.
    #[serde(default = "default_features_dir")]
    pub features_dir: String,
}

fn default_role() -> String {
    "pm".to_string()
}

fn default_backlog_path() -> String {
    "docs/backlog.json".to_string()
}

fn default_ux_dir() -> String {
    "docs/ux".to_string()
}

fn default_features_dir() -> String {
    "features".to_string()
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            current_story_id: None,
            phase: Phase::default(),
            active_role: default_role(),
            backlog_path: default_backlog_path(),
            ux_dir: default_ux_dir(),
            features_dir: default_features_dir(),
        }
    }
}

impl WorkflowState {
    /// Loads the state record, creating and persisting defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::CorruptedState` if the record exists but does
    /// not parse.
    pub fn load_or_create(store: &dyn ArtifactStore, path: &Path) -> Result<Self> {
        match storage::read_state(store, path)? {
            Some(state) => Ok(state),
            None => {
                let state = Self::default();
                state.save(store, path)?;
                Ok(state)
            }
        }
    }

    /// Persists the state record.
    pub fn save(&self, store: &dyn ArtifactStore, path: &Path) -> Result<()> {
        storage::write_state(store, path, self)
    }

    /// Switches phase and saves.
    pub fn set_phase(&mut self, store: &dyn ArtifactStore, path: &Path, phase: Phase) -> Result<()> {
        self.phase = phase;
        self.save(store, path)
    }

    /// Marks a story as current and saves.
    pub fn start_story(
        &mut self,
        store: &dyn ArtifactStore,
        path: &Path,
        id: StoryId,
    ) -> Result<()> {
        self.current_story_id = Some(id);
        self.save(store, path)
    }

    /// Roles suggested for the current phase.
    pub fn recommended_roles(&self) -> &'static [&'static str] {
        self.phase.recommended_roles()
    }
}

/// Delivery phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Discovery: PRD analysis and backlog shaping.
    Assess,

    /// Per-story planning and implementation.
    #[default]
    Develop,

    /// Operations after release.
    Sustain,
}

impl Phase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Assess => "assess",
            Phase::Develop => "develop",
            Phase::Sustain => "sustain",
        }
    }

    /// Roles that usually take part in this phase.
    pub fn recommended_roles(&self) -> &'static [&'static str] {
        match self {
            Phase::Assess => &["analyst", "pm"],
            Phase::Develop => &[
                "pm",
                "sm",
                "architect",
                "ux",
                "dev",
                "qa",
                "security",
                "devops",
                "data",
            ],
            Phase::Sustain => &["devops", "security", "data", "pm"],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Phase {
    type Err = StorylineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assess" => Ok(Phase::Assess),
            "develop" => Ok(Phase::Develop),
            "sustain" => Ok(Phase::Sustain),
            _ => Err(StorylineError::InvalidPhase(s.to_string())),
        }
    }
}
