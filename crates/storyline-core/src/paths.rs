//! Deterministic artifact paths.
//!
//! Every per-story artifact lives at a path derived from the story id and a
//! fixed kind-to-directory mapping. The presence of that path is the only
//! completion signal the workflow uses.

use crate::model::StoryId;
use std::fmt;
use std::path::PathBuf;

/// Kind of per-story artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Ux,
    Adr,
    DeepPlan,
    QaPlan,
    Traceability,
    ThreatModel,
    DevOpsPlan,
    AnalyticsSpec,
    StoryShard,
    StaticAnalysisReport,
    SecretsReport,
    PrivacyReview,
    QaDesignReview,
    ArchitectureReview,
    DevOpsRunbook,
    RiskRecord,
}

impl ArtifactKind {
    /// Artifacts every story needs before implementation, in report order.
    pub const REQUIRED: [ArtifactKind; 9] = [
        ArtifactKind::Ux,
        ArtifactKind::Adr,
        ArtifactKind::DeepPlan,
        ArtifactKind::QaPlan,
        ArtifactKind::Traceability,
        ArtifactKind::ThreatModel,
        ArtifactKind::DevOpsPlan,
        ArtifactKind::AnalyticsSpec,
        ArtifactKind::StoryShard,
    ];

    /// Human-readable label used in gate issues and links.
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Ux => "UX",
            ArtifactKind::Adr => "ADR",
            ArtifactKind::DeepPlan => "Deep Plan",
            ArtifactKind::QaPlan => "QA Plan",
            ArtifactKind::Traceability => "Traceability",
            ArtifactKind::ThreatModel => "Threat Model",
            ArtifactKind::DevOpsPlan => "DevOps Plan",
            ArtifactKind::AnalyticsSpec => "Analytics Spec",
            ArtifactKind::StoryShard => "Story Shard",
            ArtifactKind::StaticAnalysisReport => "Static Analysis Report",
            ArtifactKind::SecretsReport => "Secrets Report",
            ArtifactKind::PrivacyReview => "Privacy Review",
            ArtifactKind::QaDesignReview => "QA Design Review",
            ArtifactKind::ArchitectureReview => "Architecture Review",
            ArtifactKind::DevOpsRunbook => "DevOps Runbook",
            ArtifactKind::RiskRecord => "Risk Record",
        }
    }

    /// Template name that renders this kind, if it is a rendered document.
    pub fn template(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::Ux => Some("ux"),
            ArtifactKind::Adr => Some("adr"),
            ArtifactKind::DeepPlan => Some("deep_plan"),
            ArtifactKind::QaPlan => Some("qa_plan"),
            ArtifactKind::Traceability => Some("traceability"),
            ArtifactKind::ThreatModel => Some("threat_model"),
            ArtifactKind::DevOpsPlan => Some("devops_plan"),
            ArtifactKind::AnalyticsSpec => Some("analytics_spec"),
            ArtifactKind::StoryShard => Some("story_shard"),
            ArtifactKind::PrivacyReview => Some("privacy_review"),
            ArtifactKind::QaDesignReview => Some("qa_design_review"),
            ArtifactKind::ArchitectureReview => Some("architecture_review"),
            ArtifactKind::DevOpsRunbook => Some("devops_runbook"),
            ArtifactKind::StaticAnalysisReport
            | ArtifactKind::SecretsReport
            | ArtifactKind::RiskRecord => None,
        }
    }

    /// Relative path of this artifact for a story.
    pub fn path(&self, id: StoryId) -> PathBuf {
        let rel = match self {
            ArtifactKind::Ux => format!("docs/ux/story-{id}.md"),
            ArtifactKind::Adr => format!("docs/architecture/ADR-story-{id}.md"),
            ArtifactKind::DeepPlan => format!("docs/planning/story-{id}.md"),
            ArtifactKind::QaPlan => format!("docs/qa/plans/story-{id}.md"),
            ArtifactKind::Traceability => format!("docs/qa/trace/story-{id}.md"),
            ArtifactKind::ThreatModel => format!("docs/security/threats/story-{id}.md"),
            ArtifactKind::DevOpsPlan => format!("docs/devops/story-{id}.md"),
            ArtifactKind::AnalyticsSpec => format!("docs/data/analytics/story-{id}.md"),
            ArtifactKind::StoryShard => format!("docs/stories/story-{id}.md"),
            ArtifactKind::StaticAnalysisReport => format!("docs/security/semgrep/story-{id}.json"),
            ArtifactKind::SecretsReport => format!("docs/security/secrets/story-{id}.json"),
            ArtifactKind::PrivacyReview => format!("docs/security/privacy/story-{id}.md"),
            ArtifactKind::QaDesignReview => format!("docs/qa/design/story-{id}.md"),
            ArtifactKind::ArchitectureReview => {
                format!("docs/architecture/reviews/story-{id}.md")
            }
            ArtifactKind::DevOpsRunbook => format!("docs/devops/runbooks/story-{id}.md"),
            ArtifactKind::RiskRecord => format!("docs/qa/risk/story-{id}.json"),
        };
        PathBuf::from(rel)
    }

    /// Path as a forward-slash string, the form recorded in outcomes.
    pub fn path_string(&self, id: StoryId) -> String {
        to_slash(&self.path(id))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Renders a relative path with `/` separators on every platform.
pub fn to_slash(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Scaffold README path inside the configured `features_dir`.
pub fn scaffold_readme(features_dir: &str, id: StoryId) -> PathBuf {
    PathBuf::from(features_dir)
        .join(format!("story-{id}"))
        .join("README.md")
}

/// Per-story journal file.
pub fn journal_file(journal_dir: &std::path::Path, scope: &str) -> PathBuf {
    journal_dir.join(format!("{scope}.jsonl"))
}

/// Per-scope timeline document.
pub fn timeline_file(scope: &str) -> PathBuf {
    PathBuf::from(format!("docs/timeline/{scope}.md"))
}
