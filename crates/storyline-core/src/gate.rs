//! Gate evaluator: decides whether a story is ready for implementation.
//!
//! The policy is a fixed list of [`GateRule`]s. Each rule names an artifact
//! and the precondition under which it becomes required. Preconditions are
//! computed once per evaluation into [`StorySignals`] by two narrow content
//! adapters ([`sniff_pii`] and [`read_risk_signal`]); the rule engine itself
//! never looks at file content.
//!
//! Scan reports are checked separately: their *content* decides, and a
//! missing report is not an issue.

use crate::model::{Backlog, StoryId};
use crate::paths::ArtifactKind;
use crate::risk;
use crate::tools::store::ArtifactStore;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// When a rule's artifact is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Always required.
    Always,
    /// Required when the analytics spec declares PII.
    PiiDeclared,
    /// Required when the risk record says `high`.
    HighRisk,
}

/// Issue text reported when a required artifact is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingMessage {
    /// `Missing {label}: {path}`.
    LabelAndPath,
    /// A fixed sentence.
    Fixed(&'static str),
}

/// One entry of the gate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRule {
    pub precondition: Precondition,
    pub artifact: ArtifactKind,
    pub missing: MissingMessage,
}

impl GateRule {
    const fn always(artifact: ArtifactKind) -> Self {
        Self {
            precondition: Precondition::Always,
            artifact,
            missing: MissingMessage::LabelAndPath,
        }
    }

    const fn when(precondition: Precondition, artifact: ArtifactKind, message: &'static str) -> Self {
        Self {
            precondition,
            artifact,
            missing: MissingMessage::Fixed(message),
        }
    }

    fn missing_issue(&self, path: &str) -> String {
        match self.missing {
            MissingMessage::LabelAndPath => format!("Missing {}: {}", self.artifact.label(), path),
            MissingMessage::Fixed(message) => message.to_string(),
        }
    }
}

/// Standard policy, in check order.
pub const STANDARD_RULES: [GateRule; 13] = [
    GateRule::always(ArtifactKind::Ux),
    GateRule::always(ArtifactKind::Adr),
    GateRule::always(ArtifactKind::DeepPlan),
    GateRule::always(ArtifactKind::QaPlan),
    GateRule::always(ArtifactKind::Traceability),
    GateRule::always(ArtifactKind::ThreatModel),
    GateRule::always(ArtifactKind::DevOpsPlan),
    GateRule::always(ArtifactKind::AnalyticsSpec),
    GateRule::always(ArtifactKind::StoryShard),
    GateRule::when(
        Precondition::PiiDeclared,
        ArtifactKind::PrivacyReview,
        "Missing Privacy Review for analytics PII",
    ),
    GateRule::when(
        Precondition::HighRisk,
        ArtifactKind::QaDesignReview,
        "Missing QA Design Review for high-risk story",
    ),
    GateRule::when(
        Precondition::HighRisk,
        ArtifactKind::ArchitectureReview,
        "Missing Architecture Review for high-risk story",
    ),
    GateRule::when(
        Precondition::HighRisk,
        ArtifactKind::DevOpsRunbook,
        "Missing DevOps Runbook for high-risk story",
    ),
];

/// What the risk record says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskSignal {
    /// No risk record.
    Absent,
    /// Record present with this lowercased level (`low` when unset).
    Level(String),
    /// Record present but malformed.
    Invalid,
}

impl RiskSignal {
    fn is_high(&self) -> bool {
        matches!(self, RiskSignal::Level(level) if level == "high")
    }
}

/// Facts about a story that switch conditional rules on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySignals {
    pub pii_declared: bool,
    pub risk: RiskSignal,
}

impl StorySignals {
    /// Reads the signals for a story from the store.
    pub fn collect(store: &dyn ArtifactStore, id: StoryId) -> Self {
        Self {
            pii_declared: sniff_pii(store, id),
            risk: read_risk_signal(store, id),
        }
    }

    fn holds(&self, precondition: Precondition) -> bool {
        match precondition {
            Precondition::Always => true,
            Precondition::PiiDeclared => self.pii_declared,
            Precondition::HighRisk => self.risk.is_high(),
        }
    }
}

/// Checks whether the analytics spec declares personal data.
///
/// Looks at the first line (lowercased, trimmed) starting with `pii:` or
/// `- pii:`. A value that is non-empty and does not start with `none`
/// counts as declared.
pub fn sniff_pii(store: &dyn ArtifactStore, id: StoryId) -> bool {
    let path = ArtifactKind::AnalyticsSpec.path(id);
    let Ok(text) = store.read_to_string(&path) else {
        return false;
    };
    declares_pii(&text)
}

fn declares_pii(text: &str) -> bool {
    let text = text.to_lowercase();
    let Some(line) = text.lines().map(str::trim).find(|l| l.starts_with("pii:") || l.starts_with("- pii:"))
    else {
        return false;
    };
    let value = line.split_once(':').map_or("", |(_, v)| v.trim());
    !value.is_empty() && !value.starts_with("none")
}

/// Reads the risk record for a story.
pub fn read_risk_signal(store: &dyn ArtifactStore, id: StoryId) -> RiskSignal {
    let path = ArtifactKind::RiskRecord.path(id);
    if !store.exists(&path) {
        return RiskSignal::Absent;
    }
    match store.read_to_string(&path).ok().as_deref().and_then(risk::parse_level) {
        Some(level) => RiskSignal::Level(level.unwrap_or_else(|| "low".to_string())),
        None => RiskSignal::Invalid,
    }
}

/// Gate verdict for one story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    /// `true` when `issues` is empty.
    pub pass: bool,
    /// Human-readable problems, in rule order.
    pub issues: Vec<String>,
    /// Artifact paths inspected, required or conditionally required.
    pub checked_paths: Vec<String>,
}

impl GateVerdict {
    /// Status label used in journals and on the board.
    pub fn label(&self) -> &'static str {
        if self.pass { "PASS" } else { "FAIL" }
    }
}

/// Evaluates the gate for a story.
///
/// Pure for a fixed store state. An unknown story fails with a single
/// issue and no checked paths.
#[tracing::instrument(skip(backlog, store))]
pub fn evaluate(backlog: &Backlog, story_id: StoryId, store: &dyn ArtifactStore) -> GateVerdict {
    let Some(story) = backlog.find_story(story_id) else {
        return GateVerdict {
            pass: false,
            issues: vec![format!("Story {story_id} not found")],
            checked_paths: Vec::new(),
        };
    };

    let mut issues = Vec::new();
    let mut checked_paths = Vec::new();

    if story.acceptance_criteria.is_empty() {
        issues.push("Acceptance criteria missing".to_string());
    }

    let signals = StorySignals::collect(store, story_id);
    debug!(pii = signals.pii_declared, risk = ?signals.risk, "Gate signals");

    apply_rules(Precondition::Always, &signals, story_id, store, &mut issues, &mut checked_paths);
    check_static_analysis(store, story_id, &mut issues);
    check_secrets(store, story_id, &mut issues);
    apply_rules(Precondition::PiiDeclared, &signals, story_id, store, &mut issues, &mut checked_paths);
    if signals.risk == RiskSignal::Invalid {
        issues.push("Invalid risk file format".to_string());
    }
    apply_rules(Precondition::HighRisk, &signals, story_id, store, &mut issues, &mut checked_paths);

    let verdict = GateVerdict {
        pass: issues.is_empty(),
        issues,
        checked_paths,
    };
    info!(story_id, verdict = verdict.label(), issues = verdict.issues.len(), "Gate evaluated");
    verdict
}

fn apply_rules(
    precondition: Precondition,
    signals: &StorySignals,
    story_id: StoryId,
    store: &dyn ArtifactStore,
    issues: &mut Vec<String>,
    checked_paths: &mut Vec<String>,
) {
    if !signals.holds(precondition) {
        return;
    }
    for rule in STANDARD_RULES.iter().filter(|rule| rule.precondition == precondition) {
        let shown = rule.artifact.path_string(story_id);
        if !store.exists(&rule.artifact.path(story_id)) {
            issues.push(rule.missing_issue(&shown));
        }
        checked_paths.push(shown);
    }
}

fn check_static_analysis(store: &dyn ArtifactStore, story_id: StoryId, issues: &mut Vec<String>) {
    let path = ArtifactKind::StaticAnalysisReport.path(story_id);
    let Ok(text) = store.read_to_string(&path) else {
        return;
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(report) => {
            let high = count_high_severity(&report);
            if high > 0 {
                issues.push(format!("Static analysis high-severity findings: {high}"));
            }
        }
        Err(_) => issues.push("Invalid static analysis report format".to_string()),
    }
}

fn check_secrets(store: &dyn ArtifactStore, story_id: StoryId, issues: &mut Vec<String>) {
    let path = ArtifactKind::SecretsReport.path(story_id);
    let Ok(text) = store.read_to_string(&path) else {
        return;
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(report) => {
            let count = count_secrets(&report);
            if count > 0 {
                issues.push(format!("Secrets findings detected: {count}"));
            }
        }
        Err(_) => issues.push("Invalid secrets report format".to_string()),
    }
}

/// Semgrep result counts per severity band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    /// `ERROR` or `HIGH`.
    pub high: usize,
    /// `WARNING` or `MEDIUM`.
    pub medium: usize,
    /// `INFO` or `LOW`.
    pub low: usize,
}

/// Buckets semgrep results by `extra.severity`. Results with any other
/// severity, or none, are not counted.
pub fn count_by_severity(report: &Value) -> SeverityCounts {
    let mut counts = SeverityCounts::default();
    let results = report.get("results").and_then(Value::as_array);
    for result in results.into_iter().flatten() {
        match result.pointer("/extra/severity").and_then(Value::as_str) {
            Some("ERROR" | "HIGH") => counts.high += 1,
            Some("WARNING" | "MEDIUM") => counts.medium += 1,
            Some("INFO" | "LOW") => counts.low += 1,
            _ => {}
        }
    }
    counts
}

/// Counts semgrep results whose `extra.severity` is `ERROR` or `HIGH`.
pub fn count_high_severity(report: &Value) -> usize {
    count_by_severity(report).high
}

/// Counts secret findings in a flat array or an object's `findings` array.
pub fn count_secrets(report: &Value) -> usize {
    match report {
        Value::Array(findings) => findings.len(),
        Value::Object(map) => map
            .get("findings")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        _ => 0,
    }
}
