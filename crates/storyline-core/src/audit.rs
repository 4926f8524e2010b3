//! Project-wide quality audit.
//!
//! Runs the configured scanners once over the whole project, summarizes
//! their findings and lists the directories that hold the most files and
//! the most bytes. The result is written to [`QUALITY_AUDIT_PATH`].

use crate::error::Result;
use crate::gate::{self, SeverityCounts};
use crate::paths::{self, ArtifactKind};
use crate::scan::{ScanOutcome, ScanStatus, Scanner};
use crate::tools::store::{ArtifactStore, FileEntry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where the audit report is written.
pub const QUALITY_AUDIT_PATH: &str = "docs/analyst/quality-audit.md";

/// Hotspots listed per ranking.
pub const HOTSPOT_LIMIT: usize = 10;

fn should_skip_dir(name: &str) -> bool {
    matches!(
        name,
        ".git" | "node_modules" | ".venv" | "venv" | ".storyline" | ".idea" | ".vscode" | "target"
    )
}

/// Summary of one audit run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub path: PathBuf,
    pub static_analysis: ScanStatus,
    pub secrets_scan: ScanStatus,
    /// Semgrep results per severity band; zero unless the scan was ok.
    pub severity: SeverityCounts,
    /// Gitleaks findings; zero unless the scan was ok.
    pub secrets: usize,
    /// Directories ranked by the number of files directly inside them.
    pub by_files: Vec<(String, usize)>,
    /// Directories ranked by the bytes of the files directly inside them.
    pub by_bytes: Vec<(String, u64)>,
}

fn scan_with(scanners: &[Box<dyn Scanner>], kind: ArtifactKind, root: &Path) -> ScanOutcome {
    match scanners.iter().find(|s| s.kind() == kind) {
        Some(scanner) => {
            let outcome = scanner.scan(root);
            if outcome.status != ScanStatus::Ok {
                warn!(
                    scanner = scanner.name(),
                    status = outcome.status.as_str(),
                    reason = outcome.reason.as_deref().unwrap_or(""),
                    "Audit scan did not complete"
                );
            }
            outcome
        }
        None => ScanOutcome::skipped("scanner disabled"),
    }
}

/// Ranks directories by a per-file measure, largest first and then by name.
fn rank<T, F>(files: &[FileEntry], measure: F) -> Vec<(String, T)>
where
    T: Copy + Ord + Default + std::ops::AddAssign,
    F: Fn(&FileEntry) -> T,
{
    let mut totals: BTreeMap<String, T> = BTreeMap::new();
    for file in files {
        let dir = match file.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => paths::to_slash(parent),
            _ => ".".to_string(),
        };
        *totals.entry(dir).or_default() += measure(file);
    }

    let mut ranked: Vec<_> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(HOTSPOT_LIMIT);
    ranked
}

fn hotspot_lines<T: std::fmt::Display>(ranked: &[(String, T)], unit: &str) -> Vec<String> {
    if ranked.is_empty() {
        return vec!["- None".to_string()];
    }
    ranked
        .iter()
        .map(|(dir, value)| format!("- {dir}: {value} {unit}"))
        .collect()
}

/// Renders the audit report as markdown.
pub fn render_audit(report: &AuditReport) -> String {
    let SeverityCounts { high, medium, low } = report.severity;
    let mut lines = vec![
        "# Code Quality Audit".to_string(),
        String::new(),
        format!(
            "- Semgrep: high={high}, medium={medium}, low={low} ({})",
            report.static_analysis.as_str()
        ),
        format!(
            "- Gitleaks: findings={} ({})",
            report.secrets,
            report.secrets_scan.as_str()
        ),
        String::new(),
        "## Hotspots (by file count)".to_string(),
    ];
    lines.extend(hotspot_lines(&report.by_files, "files"));
    lines.push(String::new());
    lines.push("## Hotspots (by total bytes)".to_string());
    lines.extend(hotspot_lines(&report.by_bytes, "bytes"));
    lines.extend(
        [
            "",
            "## Recommendations",
            "- Address high-severity findings before new feature work.",
            "- Rotate and remove any detected secrets immediately.",
            "- Consider stabilization epics for hotspots with significant findings or size.",
            "- Right-size large stories touching hotspots or break them into smaller slices.",
            "",
        ]
        .map(String::from),
    );
    lines.join("\n")
}

/// Scans the project at `root`, ranks its hotspots and writes the report.
///
/// Scanner failures are reported in the summary, never raised.
///
/// # Errors
///
/// Returns an error if the project files cannot be listed or the report
/// cannot be written.
#[tracing::instrument(skip(store, scanners))]
pub fn run_audit(store: &dyn ArtifactStore, root: &Path, scanners: &[Box<dyn Scanner>]) -> Result<AuditReport> {
    let static_analysis = scan_with(scanners, ArtifactKind::StaticAnalysisReport, root);
    let secrets_scan = scan_with(scanners, ArtifactKind::SecretsReport, root);

    let severity = match static_analysis.status {
        ScanStatus::Ok => gate::count_by_severity(&static_analysis.report),
        _ => SeverityCounts::default(),
    };
    let secrets = match secrets_scan.status {
        ScanStatus::Ok => gate::count_secrets(&secrets_scan.report),
        _ => 0,
    };

    let files = store.list_files(Path::new(""), &should_skip_dir)?;
    let report = AuditReport {
        path: PathBuf::from(QUALITY_AUDIT_PATH),
        static_analysis: static_analysis.status,
        secrets_scan: secrets_scan.status,
        severity,
        secrets,
        by_files: rank(&files, |_| 1usize),
        by_bytes: rank(&files, |file| file.size),
    };

    store.write(&report.path, &render_audit(&report))?;
    info!(
        high = severity.high,
        secrets,
        files = files.len(),
        "Quality audit written"
    );
    Ok(report)
}
