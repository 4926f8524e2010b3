//! Engine facade for Storyline workflows.
//!
//! This module provides the [`Engine`] struct which wires configuration,
//! collaborator adapters, templates and the journal together and exposes
//! every workflow operation the CLI needs.

use crate::audit::{self, AuditReport};
use crate::board::{self, StatusUpdate};
use crate::config::StorylineConfig;
use crate::enrich::{self, Refinement};
use crate::error::{Result, StorylineError};
use crate::gate::{self, GateVerdict};
use crate::generate::{ScaffoldOutcome, Scaffolder};
use crate::journal::{self, FileJournal, JournalEntry, JournalSink};
use crate::model::{Backlog, StoryId};
use crate::orchestrator::{Orchestrator, PrepareOutcome, ReviewKind, ReviewOutcome};
use crate::parser;
use crate::paths;
use crate::risk::{self, RiskLevel};
use crate::scan;
use crate::sprint::{self, SprintBatch};
use crate::state::{Phase, WorkflowState};
use crate::storage;
use crate::tools::ToolRegistry;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyline_templates::TemplateManager;
use tracing::{info, warn};

/// Epics list written next to the backlog.
pub const EPICS_MD: &str = "docs/epics.md";

/// Copy of the previous backlog kept when it is replaced.
pub const BACKLOG_BACKUP: &str = "docs/backlog.backup.json";

/// Runtime trait for the core backlog operations.
///
/// Allows alternative engine implementations and facilitates testing.
pub trait Runtime {
    /// Parses a PRD into the backlog store.
    fn plan(&self, prd: &Path) -> Result<PlanSummary>;

    /// Creates the missing artifacts of a story and evaluates its gate.
    fn prepare_story(&self, story_id: StoryId, also_scaffold: bool) -> Result<PrepareOutcome>;

    /// Evaluates the gate of a story without creating anything.
    fn gate(&self, story_id: StoryId) -> Result<GateVerdict>;

    /// Packs the backlog into sprints and writes the sprint documents.
    fn plan_sprints(&self, options: SprintOptions) -> Result<SprintPlan>;
}

/// Result of [`Runtime::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub epics: usize,
    pub stories: usize,
    pub backlog_path: PathBuf,
    pub epics_path: PathBuf,
    /// Set when an earlier backlog was replaced.
    pub backup_path: Option<PathBuf>,
}

/// Overrides for sprint planning; `None` uses the configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SprintOptions {
    pub capacity: Option<f64>,
    pub weeks: Option<u32>,
    /// Plan from the enriched backlog instead of the stored one.
    pub enriched: bool,
}

/// Result of [`Runtime::plan_sprints`].
#[derive(Debug, Clone, PartialEq)]
pub struct SprintPlan {
    pub capacity: f64,
    pub weeks: u32,
    pub batches: Vec<SprintBatch>,
    pub written: Vec<PathBuf>,
}

/// Result of accepting proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptSummary {
    pub updated: Vec<StoryId>,
    pub backup_path: PathBuf,
}

/// Storyline engine.
///
/// # Examples
///
/// ```no_run
/// use storyline_core::{Engine, Runtime, StorylineConfig};
/// use std::path::{Path, PathBuf};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StorylineConfig::load(PathBuf::from("/path/to/project"))?;
/// let engine = Engine::new(config)?;
///
/// engine.plan(Path::new("docs/PRD.md"))?;
/// let outcome = engine.prepare_story(1, false)?;
/// println!("Gate: {}", outcome.gate_label());
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    /// Storyline configuration.
    pub config: StorylineConfig,

    /// Collaborator adapters.
    pub tools: ToolRegistry,

    templates: Arc<TemplateManager>,
    journal: Arc<dyn JournalSink>,
    orchestrator: Orchestrator,
}

impl Engine {
    /// Creates an engine over the real project directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured template directory cannot be
    /// loaded.
    pub fn new(config: StorylineConfig) -> Result<Self> {
        let tools = ToolRegistry::standard(&config.root);
        Self::with_tools(config, tools)
    }

    /// Creates an engine over the given adapters.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured template directory cannot be
    /// loaded.
    pub fn with_tools(config: StorylineConfig, tools: ToolRegistry) -> Result<Self> {
        let templates = Arc::new(Self::init_templates(&config)?);
        let journal: Arc<dyn JournalSink> = Arc::new(FileJournal::new(
            Arc::clone(&tools.store),
            config.journal_dir.clone(),
        ));
        let orchestrator =
            Orchestrator::new(&config, &tools, Arc::clone(&templates), Arc::clone(&journal));

        Ok(Self {
            config,
            tools,
            templates,
            journal,
            orchestrator,
        })
    }

    fn init_templates(config: &StorylineConfig) -> Result<TemplateManager> {
        match config.template_dir_abs() {
            Some(dir) if dir.is_dir() => Ok(TemplateManager::with_override_dir(dir)?),
            Some(dir) => {
                warn!(dir = %dir.display(), "Template directory not found, using embedded templates");
                Ok(TemplateManager::embedded())
            }
            None => Ok(TemplateManager::embedded()),
        }
    }

    fn store(&self) -> &dyn crate::tools::store::ArtifactStore {
        self.tools.store.as_ref()
    }

    /// Reads the backlog store.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::BacklogNotFound` when no backlog exists.
    pub fn backlog(&self) -> Result<Backlog> {
        storage::require_backlog(self.store(), &self.config.backlog_path)
    }

    fn save_backlog(&self, backlog: &Backlog) -> Result<()> {
        storage::write_backlog(self.store(), &self.config.backlog_path, backlog)
    }

    fn backup_backlog(&self) -> Result<Option<PathBuf>> {
        let path = &self.config.backlog_path;
        if !self.store().exists(path) {
            return Ok(None);
        }
        let backup = PathBuf::from(BACKLOG_BACKUP);
        let current = self.store().read_to_string(path)?;
        self.store().write(&backup, &current)?;
        Ok(Some(backup))
    }

    /// Loads the workflow state, creating it on first use.
    pub fn state(&self) -> Result<WorkflowState> {
        WorkflowState::load_or_create(self.store(), &self.config.state_file)
    }

    /// Switches the delivery phase.
    pub fn set_phase(&self, phase: Phase) -> Result<WorkflowState> {
        let mut state = self.state()?;
        state.active_role = match phase {
            Phase::Assess => "analyst",
            Phase::Develop => "pm",
            Phase::Sustain => "devops",
        }
        .to_string();
        state.set_phase(self.store(), &self.config.state_file, phase)?;
        self.journal.record(
            &JournalEntry::now(phase.as_str(), "PM", "set_phase").with_status(phase.as_str()),
        )?;
        Ok(state)
    }

    /// Scaffolds a story and makes it the current one.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::StoryNotFound` if the story is not in the
    /// backlog.
    pub fn start(&self, story_id: StoryId) -> Result<ScaffoldOutcome> {
        let backlog = self.backlog()?;
        let story = backlog
            .find_story(story_id)
            .ok_or(StorylineError::StoryNotFound(story_id))?;
        let epic_title = backlog.epic_of(story).map_or("", |epic| epic.title.as_str());

        let scaffolder = Scaffolder::new(&self.config.features_dir, Arc::clone(&self.templates));
        let scaffold = scaffolder.scaffold(self.store(), story, epic_title)?;

        let mut state = self.state()?;
        state.start_story(self.store(), &self.config.state_file, story_id)?;

        let created = if scaffold.created {
            vec![scaffold.path.clone()]
        } else {
            Vec::new()
        };
        self.journal.record(
            &JournalEntry::now(state.phase.as_str(), "Dev", "start_story")
                .for_story(story_id)
                .with_message(format!("Started story {story_id}: {}", story.title))
                .with_artifacts(vec!["Dev".to_string()], created, Vec::new()),
        )?;
        info!(story_id, scaffold = %scaffold.path, "Story started");
        Ok(scaffold)
    }

    /// Prepares the current story, or picks the next one and prepares it.
    ///
    /// # Returns
    ///
    /// `None` when there is no current story and no story without
    /// dependencies.
    pub fn next(&self, also_scaffold: bool) -> Result<Option<PrepareOutcome>> {
        let backlog = self.backlog()?;
        let mut state = self.state()?;

        let current = state
            .current_story_id
            .filter(|id| backlog.find_story(*id).is_some());
        let story_id = match current {
            Some(id) => id,
            None => match enrich::select_next_story(&backlog) {
                Some(story) => {
                    state.start_story(self.store(), &self.config.state_file, story.id)?;
                    story.id
                }
                None => return Ok(None),
            },
        };

        self.prepare_story(story_id, also_scaffold).map(Some)
    }

    /// Records the risk level of a story.
    pub fn set_risk(&self, story_id: StoryId, level: RiskLevel) -> Result<()> {
        let backlog = self.backlog()?;
        if backlog.find_story(story_id).is_none() {
            return Err(StorylineError::StoryNotFound(story_id));
        }
        risk::write_risk(self.store(), story_id, level)
    }

    /// Risk level of a story, if recorded.
    pub fn risk(&self, story_id: StoryId) -> Result<Option<RiskLevel>> {
        risk::read_risk(self.store(), story_id)
    }

    /// Writes a conditional review document for a story.
    pub fn review(&self, story_id: StoryId, kind: ReviewKind) -> Result<ReviewOutcome> {
        self.orchestrator.write_review(story_id, kind)
    }

    /// Writes enriched backlog proposals.
    pub fn generate_proposals(&self) -> Result<(Backlog, [PathBuf; 2])> {
        let enriched = enrich::enrich_backlog(&self.backlog()?);
        let written = enrich::write_proposals(self.store(), &enriched)?;
        info!(stories = enriched.story_count(), "Proposals written");
        Ok((enriched, written))
    }

    /// Merges proposed estimates and priorities into the backlog store.
    ///
    /// Proposals are generated first when none exist. The previous backlog
    /// is kept at [`BACKLOG_BACKUP`].
    pub fn accept_proposals(&self, only_ids: &BTreeSet<StoryId>) -> Result<AcceptSummary> {
        let mut current = self.backlog()?;
        let proposed = match enrich::read_proposals(self.store())? {
            Some(proposed) => proposed,
            None => self.generate_proposals()?.0,
        };

        let updated = enrich::accept_proposals(&mut current, &proposed, only_ids);
        let backup_path = self
            .backup_backlog()?
            .unwrap_or_else(|| PathBuf::from(BACKLOG_BACKUP));
        self.save_backlog(&current)?;
        self.journal.record(
            &JournalEntry::now("assess", "PM", "accept_proposals")
                .with_message(format!("Updated stories: {updated:?}")),
        )?;
        Ok(AcceptSummary {
            updated,
            backup_path,
        })
    }

    /// Applies manual edits to the proposed backlog and rewrites it.
    ///
    /// Proposals are generated first when none exist. The backlog store
    /// itself is not touched.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::InvalidEstimate` for a non-positive
    /// estimate.
    pub fn refine_proposals(&self, refinement: &Refinement) -> Result<(Backlog, [PathBuf; 2])> {
        let mut proposed = match enrich::read_proposals(self.store())? {
            Some(proposed) => proposed,
            None => enrich::enrich_backlog(&self.backlog()?),
        };

        enrich::refine_proposals(&mut proposed, refinement)?;
        let written = enrich::write_proposals(self.store(), &proposed)?;
        self.journal.record(
            &JournalEntry::now("assess", "PM", "refine_proposals")
                .with_message(format!("{} stories proposed", proposed.story_count()))
                .with_artifacts(
                    vec!["PM".to_string()],
                    written.iter().map(|p| paths::to_slash(p)).collect(),
                    Vec::new(),
                ),
        )?;
        info!(stories = proposed.story_count(), "Proposals refined");
        Ok((proposed, written))
    }

    /// Runs the project-wide quality audit with the configured scanners.
    pub fn audit(&self) -> Result<AuditReport> {
        let scanners = scan::standard_scanners(&self.config.scanners, &self.tools.shell);
        let report = audit::run_audit(self.store(), &self.config.root, &scanners)?;
        self.journal.record(
            &JournalEntry::now("assess", "Analyst", "quality_audit")
                .with_message(format!(
                    "semgrep {}, gitleaks {}",
                    report.static_analysis.as_str(),
                    report.secrets_scan.as_str()
                ))
                .with_artifacts(
                    vec!["Analyst".to_string()],
                    vec![paths::to_slash(&report.path)],
                    Vec::new(),
                ),
        )?;
        Ok(report)
    }

    /// Re-checks the gate of a story during the sustain phase.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::BacklogNotFound` when no backlog exists.
    pub fn sustain(&self, story_id: StoryId) -> Result<GateVerdict> {
        let verdict = self.gate(story_id)?;
        self.journal.record(
            &JournalEntry::now(Phase::Sustain.as_str(), "sPM", "sustain_check")
                .for_story(story_id)
                .with_status(verdict.label())
                .with_artifacts(Vec::new(), Vec::new(), verdict.checked_paths.clone()),
        )?;
        Ok(verdict)
    }

    /// Writes the status board.
    pub fn board(&self) -> Result<PathBuf> {
        board::write_board(self.store(), &self.backlog()?)
    }

    /// Markdown timeline of a story, or of the assess phase.
    pub fn timeline(&self, story_id: Option<StoryId>) -> Result<Option<String>> {
        journal::read_timeline(self.store(), story_id)
    }
}

impl Runtime for Engine {
    #[tracing::instrument(skip(self))]
    fn plan(&self, prd: &Path) -> Result<PlanSummary> {
        let backlog = parser::parse_prd_file(self.store(), prd)?;
        let backup_path = self.backup_backlog()?;
        if let Some(backup) = &backup_path {
            info!(backup = %backup.display(), "Existing backlog replaced");
        }

        self.save_backlog(&backlog)?;
        let epics_path = PathBuf::from(EPICS_MD);
        storage::write_epics_markdown(self.store(), &epics_path, &backlog)?;
        self.state()?;

        let created = vec![
            paths::to_slash(&self.config.backlog_path),
            paths::to_slash(&epics_path),
        ];
        self.journal.record(
            &JournalEntry::now("assess", "Analyst", "plan")
                .with_message(format!(
                    "{} epics, {} stories",
                    backlog.epics.len(),
                    backlog.story_count()
                ))
                .with_status("OK")
                .with_artifacts(
                    vec!["Analyst".to_string()],
                    created,
                    vec![prd.display().to_string()],
                ),
        )?;

        Ok(PlanSummary {
            epics: backlog.epics.len(),
            stories: backlog.story_count(),
            backlog_path: self.config.backlog_path.clone(),
            epics_path,
            backup_path,
        })
    }

    fn prepare_story(&self, story_id: StoryId, also_scaffold: bool) -> Result<PrepareOutcome> {
        let outcome = self.orchestrator.prepare_story(story_id, also_scaffold)?;

        let mut backlog = self.backlog()?;
        let update = StatusUpdate {
            phase: Some(Phase::Develop.as_str().to_string()),
            owner: Some("PM".to_string()),
            next_owner: Some(if outcome.gate_pass { "Dev" } else { "PM" }.to_string()),
            gate: Some(outcome.gate_label().to_string()),
        };
        if board::update_story_fields(&mut backlog, story_id, update) {
            self.save_backlog(&backlog)?;
            board::write_board(self.store(), &backlog)?;
        }
        Ok(outcome)
    }

    fn gate(&self, story_id: StoryId) -> Result<GateVerdict> {
        Ok(gate::evaluate(&self.backlog()?, story_id, self.store()))
    }

    fn plan_sprints(&self, options: SprintOptions) -> Result<SprintPlan> {
        let capacity = options.capacity.unwrap_or(self.config.sprint.capacity);
        let weeks = options.weeks.unwrap_or(self.config.sprint.weeks);
        if capacity.is_nan() || capacity <= 0.0 {
            return Err(StorylineError::InvalidConfig(
                "capacity must be greater than 0".to_string(),
            ));
        }

        let backlog = self.backlog()?;
        let backlog = if options.enriched {
            enrich::enrich_backlog(&backlog)
        } else {
            backlog
        };
        let batches = sprint::plan_sprints(&backlog, capacity);
        let written = sprint::write_sprint_plan(self.store(), &batches, capacity, weeks)?;

        Ok(SprintPlan {
            capacity,
            weeks,
            batches,
            written,
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}
