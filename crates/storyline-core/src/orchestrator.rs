//! Per-story artifact pipeline.
//!
//! The orchestrator walks an ordered list of [`PipelineStep`]s for one
//! story, creating the artifacts that do not exist yet and running the
//! scanners, then hands the result to the gate evaluator. Existing
//! artifacts are never overwritten; running it twice is safe.

use crate::config::StorylineConfig;
use crate::error::{Result, StorylineError};
use crate::gate::{self, GateVerdict};
use crate::generate::{
    ArtifactGenerator, ExistenceView, GenerationContext, Scaffolder, role_for, standard_generator,
};
use crate::journal::{JournalEntry, JournalSink};
use crate::model::{Backlog, Story, StoryId};
use crate::paths::ArtifactKind;
use crate::scan::{self, ScanStatus, Scanner};
use crate::storage;
use crate::tools::ToolRegistry;
use crate::tools::store::ArtifactStore;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use storyline_templates::TemplateManager;
use tracing::{debug, info, warn};

/// One step of the per-story pipeline.
pub enum PipelineStep {
    /// Create an artifact unless it already exists.
    Generate(Box<dyn ArtifactGenerator>),
    /// Run a scanner and persist its report on success.
    Scan(Box<dyn Scanner>),
}

impl PipelineStep {
    /// Artifact kind the step produces.
    pub fn kind(&self) -> ArtifactKind {
        match self {
            PipelineStep::Generate(generator) => generator.kind(),
            PipelineStep::Scan(scanner) => scanner.kind(),
        }
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Generate(generator) => write!(f, "Generate({})", generator.kind()),
            PipelineStep::Scan(scanner) => write!(f, "Scan({})", scanner.name()),
        }
    }
}

const DOCUMENT_ORDER: [ArtifactKind; 8] = [
    ArtifactKind::Ux,
    ArtifactKind::Adr,
    ArtifactKind::DeepPlan,
    ArtifactKind::QaPlan,
    ArtifactKind::ThreatModel,
    ArtifactKind::DevOpsPlan,
    ArtifactKind::AnalyticsSpec,
    ArtifactKind::Traceability,
];

/// Builds the standard pipeline: eight documents, the two scanners, then
/// the story shard. Scanners are left out when disabled in `config`.
pub fn standard_pipeline(
    config: &StorylineConfig,
    tools: &ToolRegistry,
    templates: &Arc<TemplateManager>,
) -> Vec<PipelineStep> {
    let mut steps: Vec<PipelineStep> = DOCUMENT_ORDER
        .iter()
        .filter_map(|kind| standard_generator(*kind, templates))
        .map(PipelineStep::Generate)
        .collect();

    steps.extend(
        scan::standard_scanners(&config.scanners, &tools.shell)
            .into_iter()
            .map(PipelineStep::Scan),
    );

    steps.extend(standard_generator(ArtifactKind::StoryShard, templates).map(PipelineStep::Generate));
    steps
}

/// Result of preparing one story.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepareOutcome {
    pub story_id: StoryId,
    pub gate_pass: bool,
    pub issues: Vec<String>,
    /// Paths written by this run, in pipeline order.
    pub created_paths: Vec<String>,
    /// Paths that already existed and were left alone.
    pub existing_paths: Vec<String>,
    /// Roles credited for created artifacts, first use first.
    pub agents_used: Vec<String>,
    pub checked_paths: Vec<String>,
    pub scaffold_path: Option<String>,
}

impl PrepareOutcome {
    /// Gate label, `PASS` or `FAIL`.
    pub fn gate_label(&self) -> &'static str {
        if self.gate_pass { "PASS" } else { "FAIL" }
    }
}

#[derive(Debug, Default)]
struct Provenance {
    created: Vec<String>,
    existing: Vec<String>,
    agents: Vec<String>,
}

impl Provenance {
    fn created(&mut self, path: String, role: &str) {
        if !self.created.contains(&path) {
            self.created.push(path);
        }
        if !self.agents.iter().any(|a| a == role) {
            self.agents.push(role.to_string());
        }
    }

    fn existing(&mut self, path: String) {
        if !self.existing.contains(&path) {
            self.existing.push(path);
        }
    }
}

/// Conditional artifacts that are written on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewKind {
    Privacy,
    QaDesign,
    Architecture,
    Runbook,
}

impl ReviewKind {
    pub fn artifact(&self) -> ArtifactKind {
        match self {
            ReviewKind::Privacy => ArtifactKind::PrivacyReview,
            ReviewKind::QaDesign => ArtifactKind::QaDesignReview,
            ReviewKind::Architecture => ArtifactKind::ArchitectureReview,
            ReviewKind::Runbook => ArtifactKind::DevOpsRunbook,
        }
    }
}

impl FromStr for ReviewKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "privacy" => Ok(ReviewKind::Privacy),
            "qa-design" | "qa_design" => Ok(ReviewKind::QaDesign),
            "architecture" => Ok(ReviewKind::Architecture),
            "runbook" => Ok(ReviewKind::Runbook),
            other => Err(format!(
                "invalid review kind: {other} (expected privacy, qa-design, architecture or runbook)"
            )),
        }
    }
}

/// Outcome of writing one review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewOutcome {
    pub path: String,
    pub created: bool,
}

/// Drives the per-story pipeline.
pub struct Orchestrator {
    store: Arc<dyn ArtifactStore>,
    journal: Arc<dyn JournalSink>,
    templates: Arc<TemplateManager>,
    scaffolder: Scaffolder,
    steps: Vec<PipelineStep>,
    root: PathBuf,
    backlog_path: PathBuf,
}

impl Orchestrator {
    /// Creates an orchestrator running the standard pipeline.
    pub fn new(
        config: &StorylineConfig,
        tools: &ToolRegistry,
        templates: Arc<TemplateManager>,
        journal: Arc<dyn JournalSink>,
    ) -> Self {
        let steps = standard_pipeline(config, tools, &templates);
        Self::with_steps(config, tools, templates, journal, steps)
    }

    /// Creates an orchestrator running `steps`.
    pub fn with_steps(
        config: &StorylineConfig,
        tools: &ToolRegistry,
        templates: Arc<TemplateManager>,
        journal: Arc<dyn JournalSink>,
        steps: Vec<PipelineStep>,
    ) -> Self {
        Self {
            store: Arc::clone(&tools.store),
            journal,
            scaffolder: Scaffolder::new(&config.features_dir, Arc::clone(&templates)),
            templates,
            steps,
            root: config.root.clone(),
            backlog_path: config.backlog_path.clone(),
        }
    }

    /// Pipeline steps in execution order.
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Creates every missing artifact for a story and evaluates its gate.
    ///
    /// # Arguments
    ///
    /// * `story_id` - Story to prepare.
    /// * `also_scaffold` - Also create the story's implementation scaffold.
    ///
    /// # Returns
    ///
    /// The gate verdict together with what this run created and found.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::BacklogNotFound` if no backlog exists,
    /// `StorylineError::StoryNotFound` if the story is not in it, and any
    /// store or template error raised while writing artifacts. Scanner
    /// failures are not errors.
    #[tracing::instrument(skip(self))]
    pub fn prepare_story(&self, story_id: StoryId, also_scaffold: bool) -> Result<PrepareOutcome> {
        let store = self.store.as_ref();
        let backlog = storage::require_backlog(store, &self.backlog_path)?;
        let (story, epic_title) = locate(&backlog, story_id)?;

        let mut provenance = Provenance::default();
        for step in &self.steps {
            match step {
                PipelineStep::Generate(generator) => {
                    self.run_generator(generator.as_ref(), story, epic_title, &mut provenance)?;
                }
                PipelineStep::Scan(scanner) => {
                    self.run_scanner(scanner.as_ref(), story_id, &mut provenance)?;
                }
            }
        }

        let scaffold_path = if also_scaffold {
            let scaffold = self.scaffolder.scaffold(store, story, epic_title)?;
            if scaffold.created {
                info!(path = %scaffold.path, "Scaffold created");
                provenance.created.push(scaffold.path.clone());
            }
            Some(scaffold.path)
        } else {
            None
        };

        let verdict = gate::evaluate(&backlog, story_id, store);
        self.record(story, &provenance, &verdict)?;

        Ok(PrepareOutcome {
            story_id,
            gate_pass: verdict.pass,
            issues: verdict.issues,
            created_paths: provenance.created,
            existing_paths: provenance.existing,
            agents_used: provenance.agents,
            checked_paths: verdict.checked_paths,
            scaffold_path,
        })
    }

    /// Writes a review document for a story unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::BacklogNotFound` or
    /// `StorylineError::StoryNotFound` like [`Orchestrator::prepare_story`].
    pub fn write_review(&self, story_id: StoryId, kind: ReviewKind) -> Result<ReviewOutcome> {
        let store = self.store.as_ref();
        let backlog = storage::require_backlog(store, &self.backlog_path)?;
        let (story, epic_title) = locate(&backlog, story_id)?;

        let artifact = kind.artifact();
        let generator = standard_generator(artifact, &self.templates).ok_or_else(|| {
            StorylineError::InvalidConfig(format!("no template for {}", artifact.label()))
        })?;

        let mut provenance = Provenance::default();
        let created = self.run_generator(generator.as_ref(), story, epic_title, &mut provenance)?;

        let entry = JournalEntry::now("develop", generator.role(), "write_review")
            .for_story(story_id)
            .with_message(format!("{} for story {story_id}", artifact.label()))
            .with_status(if created { "CREATED" } else { "EXISTS" })
            .with_artifacts(provenance.agents, provenance.created, provenance.existing);
        self.journal.record(&entry)?;

        Ok(ReviewOutcome {
            path: artifact.path_string(story_id),
            created,
        })
    }

    fn run_generator(
        &self,
        generator: &dyn ArtifactGenerator,
        story: &Story,
        epic_title: &str,
        provenance: &mut Provenance,
    ) -> Result<bool> {
        let kind = generator.kind();
        let path = kind.path(story.id);
        let shown = kind.path_string(story.id);
        let store = self.store.as_ref();

        if store.exists(&path) {
            debug!(path = %shown, "Artifact exists, skipping");
            provenance.existing(shown);
            return Ok(false);
        }

        let ctx = GenerationContext {
            story,
            epic_title,
            artifacts: ExistenceView::new(store),
        };
        let body = generator.generate(&ctx)?;
        if store.write_if_absent(&path, &body)? {
            info!(path = %shown, role = generator.role(), "Artifact created");
            provenance.created(shown, generator.role());
            Ok(true)
        } else {
            debug!(path = %shown, "Artifact appeared concurrently, keeping it");
            provenance.existing(shown);
            Ok(false)
        }
    }

    fn run_scanner(&self, scanner: &dyn Scanner, story_id: StoryId, provenance: &mut Provenance) -> Result<()> {
        let outcome = scanner.scan(&self.root);
        match outcome.status {
            ScanStatus::Ok => {
                let kind = scanner.kind();
                let body = serde_json::to_string_pretty(&outcome.report)?;
                self.store.write(&kind.path(story_id), &body)?;
                let shown = kind.path_string(story_id);
                info!(scanner = scanner.name(), path = %shown, "Scan report written");
                provenance.created(shown, role_for(kind));
            }
            ScanStatus::Skipped | ScanStatus::Error => {
                warn!(
                    scanner = scanner.name(),
                    status = ?outcome.status,
                    reason = outcome.reason.as_deref().unwrap_or("-"),
                    "Scan produced no report"
                );
            }
        }
        Ok(())
    }

    fn record(&self, story: &Story, provenance: &Provenance, verdict: &GateVerdict) -> Result<()> {
        let entry = JournalEntry::now("develop", "PM", "prepare_story")
            .for_story(story.id)
            .with_message(format!("Prepared story {}: {}", story.id, story.title))
            .with_status(verdict.label())
            .with_artifacts(
                provenance.agents.clone(),
                provenance.created.clone(),
                verdict.checked_paths.clone(),
            )
            .with_extra("issues", json!(verdict.issues));
        self.journal.record(&entry)
    }
}

fn locate(backlog: &Backlog, story_id: StoryId) -> Result<(&Story, &str)> {
    let story = backlog
        .find_story(story_id)
        .ok_or(StorylineError::StoryNotFound(story_id))?;
    let epic_title = backlog.epic_of(story).map_or("", |epic| epic.title.as_str());
    Ok((story, epic_title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{FileJournal, NoopJournal, read_entries};
    use crate::model::Epic;
    use crate::scan::ScanOutcome;
    use crate::tools::shell::CommandOutput;
    use crate::tools::shell_mock::MockShellAdapter;
    use crate::tools::store_memory::MemoryArtifactStore;
    use std::path::Path;

    fn backlog() -> Backlog {
        let mut story = Story::new(1, 1, "Sign in");
        story.acceptance_criteria = vec!["User can sign in".to_string()];
        Backlog {
            epics: vec![Epic {
                id: 1,
                title: "Accounts".to_string(),
                description: String::new(),
                stories: vec![story],
            }],
        }
    }

    fn setup() -> (MemoryArtifactStore, StorylineConfig) {
        let config = StorylineConfig::new(PathBuf::from("/project"));
        let store = MemoryArtifactStore::new();
        storage::write_backlog(&store, &config.backlog_path, &backlog()).unwrap();
        (store, config)
    }

    fn orchestrator(store: &MemoryArtifactStore, config: &StorylineConfig) -> Orchestrator {
        let tools = ToolRegistry::in_memory(store.clone());
        Orchestrator::new(
            config,
            &tools,
            Arc::new(TemplateManager::embedded()),
            Arc::new(NoopJournal),
        )
    }

    struct FixedScanner(ScanOutcome);

    impl Scanner for FixedScanner {
        fn name(&self) -> &str {
            "fixed"
        }

        fn kind(&self) -> ArtifactKind {
            ArtifactKind::SecretsReport
        }

        fn scan(&self, _root: &Path) -> ScanOutcome {
            self.0.clone()
        }
    }

    #[test]
    fn test_standard_pipeline_order() {
        let (store, config) = setup();
        let kinds: Vec<ArtifactKind> = orchestrator(&store, &config)
            .steps()
            .iter()
            .map(PipelineStep::kind)
            .collect();

        assert_eq!(kinds.len(), 11);
        assert_eq!(kinds[7], ArtifactKind::Traceability);
        assert_eq!(kinds[8], ArtifactKind::StaticAnalysisReport);
        assert_eq!(kinds[9], ArtifactKind::SecretsReport);
        assert_eq!(kinds[10], ArtifactKind::StoryShard);
    }

    #[test]
    fn test_disabled_scanners_are_left_out() {
        let (store, mut config) = setup();
        config.scanners.enabled = false;
        assert_eq!(orchestrator(&store, &config).steps().len(), 9);
    }

    #[test]
    fn test_prepare_creates_all_documents_and_passes() {
        let (store, config) = setup();
        let outcome = orchestrator(&store, &config).prepare_story(1, false).unwrap();

        assert!(outcome.gate_pass, "issues: {:?}", outcome.issues);
        assert_eq!(outcome.created_paths.len(), 9);
        assert_eq!(outcome.created_paths[0], "docs/ux/story-1.md");
        assert_eq!(outcome.created_paths[8], "docs/stories/story-1.md");
        assert!(outcome.existing_paths.is_empty());
        assert_eq!(outcome.checked_paths.len(), 9);
        assert_eq!(
            outcome.agents_used,
            vec!["UX", "Architecture", "Planning", "QA", "Security", "DevOps", "Data", "PM"]
        );
        assert!(outcome.scaffold_path.is_none());
    }

    #[test]
    fn test_prepare_twice_is_idempotent() {
        let (store, config) = setup();
        let orchestrator = orchestrator(&store, &config);
        let first = orchestrator.prepare_story(1, false).unwrap();
        let ux = store.read_to_string(Path::new("docs/ux/story-1.md")).unwrap();

        let second = orchestrator.prepare_story(1, false).unwrap();

        assert!(second.created_paths.is_empty());
        assert!(second.agents_used.is_empty());
        assert_eq!(second.existing_paths, first.created_paths);
        assert_eq!(second.gate_pass, first.gate_pass);
        assert_eq!(second.checked_paths, first.checked_paths);
        assert_eq!(store.read_to_string(Path::new("docs/ux/story-1.md")).unwrap(), ux);
    }

    #[test]
    fn test_existing_artifact_is_not_overwritten() {
        let (store, config) = setup();
        store.write(Path::new("docs/architecture/ADR-story-1.md"), "hand written").unwrap();

        let outcome = orchestrator(&store, &config).prepare_story(1, false).unwrap();

        assert_eq!(outcome.existing_paths, vec!["docs/architecture/ADR-story-1.md"]);
        assert!(!outcome.agents_used.contains(&"Architecture".to_string()));
        assert_eq!(
            store.read_to_string(Path::new("docs/architecture/ADR-story-1.md")).unwrap(),
            "hand written"
        );
    }

    #[test]
    fn test_shard_links_reports_written_by_scanners() {
        let (store, config) = setup();
        let shell = MockShellAdapter::new();
        shell.set_output(
            "gitleaks",
            CommandOutput {
                exit_code: 0,
                stdout: "[]".to_string(),
                stderr: String::new(),
            },
        );
        let tools = ToolRegistry::new(Arc::new(store.clone()), Arc::new(shell));
        let orchestrator = Orchestrator::new(
            &config,
            &tools,
            Arc::new(TemplateManager::embedded()),
            Arc::new(NoopJournal),
        );

        let outcome = orchestrator.prepare_story(1, false).unwrap();

        assert!(outcome.created_paths.contains(&"docs/security/secrets/story-1.json".to_string()));
        assert!(!outcome.created_paths.contains(&"docs/security/semgrep/story-1.json".to_string()));
        let shard = store.read_to_string(Path::new("docs/stories/story-1.md")).unwrap();
        assert!(shard.contains("- Secrets Report: docs/security/secrets/story-1.json"));
        assert!(shard.contains("- Static Analysis Report: TBD"));
    }

    #[test]
    fn test_scan_report_is_rewritten_every_run() {
        let (store, config) = setup();
        let tools = ToolRegistry::in_memory(store.clone());
        let steps = vec![PipelineStep::Scan(Box::new(FixedScanner(ScanOutcome::ok(
            json!({"status": "ok", "findings": [{"RuleID": "k"}]}),
        ))))];
        let orchestrator = Orchestrator::with_steps(
            &config,
            &tools,
            Arc::new(TemplateManager::embedded()),
            Arc::new(NoopJournal),
            steps,
        );

        let first = orchestrator.prepare_story(1, false).unwrap();
        let second = orchestrator.prepare_story(1, false).unwrap();

        assert_eq!(first.created_paths, vec!["docs/security/secrets/story-1.json"]);
        assert_eq!(second.created_paths, first.created_paths);
        assert_eq!(second.agents_used, vec!["Security"]);
        assert!(second.issues.contains(&"Secrets findings detected: 1".to_string()));
    }

    #[test]
    fn test_failed_scan_persists_nothing() {
        let (store, config) = setup();
        let tools = ToolRegistry::in_memory(store.clone());
        let steps = vec![PipelineStep::Scan(Box::new(FixedScanner(ScanOutcome::error(
            "timed out",
        ))))];
        let orchestrator = Orchestrator::with_steps(
            &config,
            &tools,
            Arc::new(TemplateManager::embedded()),
            Arc::new(NoopJournal),
            steps,
        );

        let outcome = orchestrator.prepare_story(1, false).unwrap();
        assert!(outcome.created_paths.is_empty());
        assert!(!store.exists(Path::new("docs/security/secrets/story-1.json")));
    }

    #[test]
    fn test_scaffold_on_request() {
        let (store, config) = setup();
        let orchestrator = orchestrator(&store, &config);

        let first = orchestrator.prepare_story(1, true).unwrap();
        assert_eq!(first.scaffold_path.as_deref(), Some("features/story-1/README.md"));
        assert_eq!(first.created_paths.last().map(String::as_str), Some("features/story-1/README.md"));

        let second = orchestrator.prepare_story(1, true).unwrap();
        assert_eq!(second.scaffold_path.as_deref(), Some("features/story-1/README.md"));
        assert!(second.created_paths.is_empty());
    }

    #[test]
    fn test_missing_backlog_and_story() {
        let config = StorylineConfig::new(PathBuf::from("/project"));
        let store = MemoryArtifactStore::new();
        let err = orchestrator(&store, &config).prepare_story(1, false).unwrap_err();
        assert!(matches!(err, StorylineError::BacklogNotFound(_)));

        let (store, config) = setup();
        let err = orchestrator(&store, &config).prepare_story(42, false).unwrap_err();
        assert!(matches!(err, StorylineError::StoryNotFound(42)));
    }

    #[test]
    fn test_one_journal_entry_per_run() {
        let (store, config) = setup();
        store.write(Path::new("docs/ux/story-1.md"), "ux").unwrap();
        let tools = ToolRegistry::in_memory(store.clone());
        let journal = Arc::new(FileJournal::new(Arc::clone(&tools.store), &config.journal_dir));
        let orchestrator = Orchestrator::new(
            &config,
            &tools,
            Arc::new(TemplateManager::embedded()),
            journal,
        );

        let outcome = orchestrator.prepare_story(1, false).unwrap();

        let entries = read_entries(&store, &config.journal_dir, Some(1)).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.phase, "develop");
        assert_eq!(entry.actor, "PM");
        assert_eq!(entry.action, "prepare_story");
        assert_eq!(entry.status.as_deref(), Some("PASS"));
        assert_eq!(entry.artifacts_created, outcome.created_paths);
        assert_eq!(entry.artifacts_referenced, outcome.checked_paths);
        assert_eq!(entry.extra["issues"], json!([]));
    }

    #[test]
    fn test_write_review_is_idempotent() {
        let (store, config) = setup();
        let orchestrator = orchestrator(&store, &config);

        let first = orchestrator.write_review(1, ReviewKind::QaDesign).unwrap();
        assert_eq!(first.path, "docs/qa/design/story-1.md");
        assert!(first.created);
        assert!(!orchestrator.write_review(1, ReviewKind::QaDesign).unwrap().created);
    }

    #[test]
    fn test_review_kind_from_str() {
        assert_eq!("qa-design".parse::<ReviewKind>(), Ok(ReviewKind::QaDesign));
        assert_eq!("Runbook".parse::<ReviewKind>(), Ok(ReviewKind::Runbook));
        assert!("legal".parse::<ReviewKind>().is_err());
    }
}
