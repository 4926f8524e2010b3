//! External scanner collaborators.
//!
//! Scanners wrap third-party executables (semgrep, gitleaks). A scanner
//! never fails the workflow: a missing executable, a timeout, an
//! unexpected exit code or undecodable output all become a
//! [`ScanStatus`] on the outcome.

use crate::config::ScannerConfig;
use crate::error::StorylineError;
use crate::paths::ArtifactKind;
use crate::tools::shell::ShellAdapter;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result category of one scanner run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// The scanner ran and `report` holds its normalized output.
    Ok,
    /// The scanner could not run (not installed).
    Skipped,
    /// The scanner ran but its result is unusable.
    Error,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Ok => "ok",
            ScanStatus::Skipped => "skipped",
            ScanStatus::Error => "error",
        }
    }
}

/// Outcome of one scanner run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    /// Normalized report; `Value::Null` unless `status` is `Ok`.
    pub report: Value,
    /// Why the scan was skipped or failed.
    pub reason: Option<String>,
}

impl ScanOutcome {
    pub fn ok(report: Value) -> Self {
        Self {
            status: ScanStatus::Ok,
            report,
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ScanStatus::Skipped,
            report: Value::Null,
            reason: Some(reason.into()),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: ScanStatus::Error,
            report: Value::Null,
            reason: Some(reason.into()),
        }
    }
}

/// A scanner collaborator.
pub trait Scanner: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Report kind this scanner produces.
    fn kind(&self) -> ArtifactKind;

    /// Scans the project at `root`.
    fn scan(&self, root: &Path) -> ScanOutcome;
}

fn run_failure(program: &str, e: StorylineError) -> ScanOutcome {
    match e {
        StorylineError::CommandTimeout(secs) => {
            ScanOutcome::error(format!("{program} timed out after {secs}s"))
        }
        other => ScanOutcome::skipped(other.to_string()),
    }
}

/// The semgrep and gitleaks scanners configured by `config`, in that
/// order. Empty when scanning is disabled.
pub fn standard_scanners(config: &ScannerConfig, shell: &Arc<dyn ShellAdapter>) -> Vec<Box<dyn Scanner>> {
    if !config.enabled {
        return Vec::new();
    }
    let timeout = config.timeout();
    let semgrep = SemgrepScanner::new(Arc::clone(shell), config.semgrep_rules.clone(), timeout);
    let gitleaks = GitleaksScanner::new(Arc::clone(shell), timeout);
    vec![Box::new(semgrep) as Box<dyn Scanner>, Box::new(gitleaks)]
}

/// Static analysis via `semgrep`.
pub struct SemgrepScanner {
    shell: Arc<dyn ShellAdapter>,
    rules: PathBuf,
    timeout: Duration,
}

impl SemgrepScanner {
    pub const PROGRAM: &'static str = "semgrep";

    /// Creates a scanner using `rules` (relative to the scanned root) when
    /// that file exists and semgrep's `auto` config otherwise.
    pub fn new(shell: Arc<dyn ShellAdapter>, rules: PathBuf, timeout: Duration) -> Self {
        Self {
            shell,
            rules,
            timeout,
        }
    }

    fn config_arg(&self, root: &Path) -> String {
        let rules = root.join(&self.rules);
        if rules.is_file() {
            rules.display().to_string()
        } else {
            "auto".to_string()
        }
    }
}

impl Scanner for SemgrepScanner {
    fn name(&self) -> &str {
        Self::PROGRAM
    }

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::StaticAnalysisReport
    }

    fn scan(&self, root: &Path) -> ScanOutcome {
        if !self.shell.is_available(Self::PROGRAM) {
            return ScanOutcome::skipped("semgrep not installed");
        }

        let args = vec![
            "--config".to_string(),
            self.config_arg(root),
            "--json".to_string(),
            root.display().to_string(),
        ];
        debug!(args = ?args, "Running semgrep");

        let output = match self.shell.run(Self::PROGRAM, &args, Some(root), self.timeout) {
            Ok(output) => output,
            Err(e) => return run_failure(Self::PROGRAM, e),
        };
        if !output.success() {
            return ScanOutcome::error(format!(
                "semgrep exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            ));
        }

        match serde_json::from_str(&output.stdout) {
            Ok(report) => ScanOutcome::ok(report),
            Err(_) => ScanOutcome::error("semgrep produced invalid json"),
        }
    }
}

/// Secret detection via `gitleaks`.
pub struct GitleaksScanner {
    shell: Arc<dyn ShellAdapter>,
    timeout: Duration,
}

impl GitleaksScanner {
    pub const PROGRAM: &'static str = "gitleaks";

    pub fn new(shell: Arc<dyn ShellAdapter>, timeout: Duration) -> Self {
        Self { shell, timeout }
    }
}

impl Scanner for GitleaksScanner {
    fn name(&self) -> &str {
        Self::PROGRAM
    }

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::SecretsReport
    }

    fn scan(&self, root: &Path) -> ScanOutcome {
        if !self.shell.is_available(Self::PROGRAM) {
            return ScanOutcome::skipped("gitleaks not installed");
        }

        let args = vec![
            "detect".to_string(),
            "--no-git".to_string(),
            "--report-format".to_string(),
            "json".to_string(),
            "--source".to_string(),
            root.display().to_string(),
            "--report-path".to_string(),
            "-".to_string(),
        ];

        let output = match self.shell.run(Self::PROGRAM, &args, Some(root), self.timeout) {
            Ok(output) => output,
            Err(e) => return run_failure(Self::PROGRAM, e),
        };
        // Exit code 1 means leaks were found.
        if !matches!(output.exit_code, 0 | 1) {
            return ScanOutcome::error(format!(
                "gitleaks exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            ));
        }

        let stdout = output.stdout.trim();
        let data: Value = match serde_json::from_str(if stdout.is_empty() { "[]" } else { stdout }) {
            Ok(data) => data,
            Err(_) => return ScanOutcome::error("gitleaks produced invalid json"),
        };
        ScanOutcome::ok(normalize_secrets(data))
    }
}

/// Normalizes gitleaks output to `{"status": "ok", "findings": [...]}`.
pub fn normalize_secrets(data: Value) -> Value {
    let findings = match data {
        Value::Array(findings) => findings,
        Value::Object(mut map) => match map.remove("findings") {
            Some(Value::Array(findings)) => findings,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    json!({ "status": "ok", "findings": findings })
}
