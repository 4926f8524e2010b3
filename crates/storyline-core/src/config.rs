//! Configuration types for Storyline.
//!
//! Defaults cover a conventional project layout. A project can override
//! them in `.storyline/config.toml`; fields absent from the file keep their
//! defaults.

use crate::error::{Result, StorylineError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Storyline configuration.
///
/// Paths other than `root` are relative to `root`; that is the form the
/// artifact store expects.
#[derive(Debug, Clone)]
pub struct StorylineConfig {
    /// Project root directory.
    pub root: PathBuf,

    /// Backlog store (typically `docs/backlog.json`).
    pub backlog_path: PathBuf,

    /// Directory holding per-story implementation scaffolds.
    pub features_dir: PathBuf,

    /// Directory whose templates override the embedded ones, if any.
    pub template_dir: Option<PathBuf>,

    /// Workflow state record (`.storyline/state.json`).
    pub state_file: PathBuf,

    /// Journal directory (`.storyline/journal`).
    pub journal_dir: PathBuf,

    /// Configuration file (`.storyline/config.toml`).
    pub config_file: PathBuf,

    /// Scanner settings.
    pub scanners: ScannerConfig,

    /// Sprint planning settings.
    pub sprint: SprintConfig,
}

impl StorylineConfig {
    /// Creates a configuration with defaults for `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - The project root directory.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            backlog_path: PathBuf::from("docs/backlog.json"),
            features_dir: PathBuf::from("features"),
            template_dir: None,
            state_file: PathBuf::from(".storyline/state.json"),
            journal_dir: PathBuf::from(".storyline/journal"),
            config_file: PathBuf::from(".storyline/config.toml"),
            scanners: ScannerConfig::default(),
            sprint: SprintConfig::default(),
        }
    }

    /// Loads configuration for `root`, overlaying `.storyline/config.toml`
    /// on the defaults when the file exists.
    ///
    /// # Errors
    ///
    /// Returns `StorylineError::ConfigParseError` if the file is not valid
    /// TOML for this schema and `StorylineError::InvalidConfig` if a value
    /// is out of range.
    pub fn load(root: PathBuf) -> Result<Self> {
        let mut config = Self::new(root);
        let path = config.resolve(&config.config_file);
        if !path.is_file() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| StorylineError::FileReadError(format!("{}: {}", path.display(), e)))?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| StorylineError::ConfigParseError(format!("{}: {}", path.display(), e)))?;

        config.apply(file);
        config.validate()?;
        Ok(config)
    }

    /// Joins a root-relative path onto the project root.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Override template directory as an absolute path, if configured.
    pub fn template_dir_abs(&self) -> Option<PathBuf> {
        self.template_dir.as_deref().map(|dir| self.resolve(dir))
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(path) = file.backlog_path {
            self.backlog_path = path;
        }
        if let Some(dir) = file.features_dir {
            self.features_dir = dir;
        }
        if file.template_dir.is_some() {
            self.template_dir = file.template_dir;
        }
        if let Some(scanners) = file.scanners {
            if let Some(enabled) = scanners.enabled {
                self.scanners.enabled = enabled;
            }
            if let Some(secs) = scanners.timeout_secs {
                self.scanners.timeout_secs = secs;
            }
            if let Some(rules) = scanners.semgrep_rules {
                self.scanners.semgrep_rules = rules;
            }
        }
        if let Some(sprint) = file.sprint {
            if let Some(capacity) = sprint.capacity {
                self.sprint.capacity = capacity;
            }
            if let Some(weeks) = sprint.weeks {
                self.sprint.weeks = weeks;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scanners.timeout_secs == 0 {
            return Err(StorylineError::InvalidConfig(
                "scanners.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.sprint.capacity.is_nan() || self.sprint.capacity <= 0.0 {
            return Err(StorylineError::InvalidConfig(
                "sprint.capacity must be greater than 0".to_string(),
            ));
        }
        if self.sprint.weeks == 0 {
            return Err(StorylineError::InvalidConfig(
                "sprint.weeks must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// External scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Whether scan steps run at all.
    pub enabled: bool,

    /// Per-scanner time budget in seconds.
    pub timeout_secs: u64,

    /// Project-local semgrep rules; `auto` is used when absent.
    pub semgrep_rules: PathBuf,
}

impl ScannerConfig {
    /// Time budget as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 120,
            semgrep_rules: PathBuf::from(".storyline/semgrep/rules.yml"),
        }
    }
}

/// Sprint planning defaults.
#[derive(Debug, Clone)]
pub struct SprintConfig {
    /// Points per sprint.
    pub capacity: f64,

    /// Sprint length in weeks, printed in the plan.
    pub weeks: u32,
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            capacity: 20.0,
            weeks: 2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backlog_path: Option<PathBuf>,
    features_dir: Option<PathBuf>,
    template_dir: Option<PathBuf>,
    scanners: Option<ScannerSection>,
    sprint: Option<SprintSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScannerSection {
    enabled: Option<bool>,
    timeout_secs: Option<u64>,
    semgrep_rules: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SprintSection {
    capacity: Option<f64>,
    weeks: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorylineConfig::new(PathBuf::from("/project"));
        assert_eq!(config.backlog_path, PathBuf::from("docs/backlog.json"));
        assert_eq!(config.features_dir, PathBuf::from("features"));
        assert!(config.template_dir.is_none());
        assert!(config.scanners.enabled);
        assert_eq!(config.scanners.timeout(), Duration::from_secs(120));
        assert_eq!(config.sprint.capacity, 20.0);
        assert_eq!(config.sprint.weeks, 2);
        assert_eq!(
            config.resolve(&config.state_file),
            PathBuf::from("/project/.storyline/state.json")
        );
    }

    #[test]
    fn test_apply_overlays_present_fields() {
        let mut config = StorylineConfig::new(PathBuf::from("/project"));
        let file: ConfigFile = toml::from_str(
            r#"
features_dir = "src/features"

[scanners]
timeout_secs = 30
"#,
        )
        .unwrap();
        config.apply(file);

        assert_eq!(config.features_dir, PathBuf::from("src/features"));
        assert_eq!(config.scanners.timeout_secs, 30);
        assert!(config.scanners.enabled);
        assert_eq!(config.backlog_path, PathBuf::from("docs/backlog.json"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = StorylineConfig::new(PathBuf::from("/project"));
        config.sprint.capacity = 0.0;
        assert!(matches!(
            config.validate(),
            Err(StorylineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: std::result::Result<ConfigFile, _> = toml::from_str("colour = \"blue\"");
        assert!(result.is_err());
    }
}
