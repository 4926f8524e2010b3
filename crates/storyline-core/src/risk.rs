//! Per-story risk records.
//!
//! A risk record is a small JSON object at `docs/qa/risk/story-{id}.json`
//! with an optional `level` string. Only `high` changes gating.

use crate::error::{Result, StorylineError};
use crate::model::StoryId;
use crate::paths::ArtifactKind;
use crate::tools::store::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Risk level of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("invalid risk level: {other} (expected low, medium or high)")),
        }
    }
}

#[derive(Debug, Serialize)]
struct RiskRecord {
    level: RiskLevel,
}

/// Writes the risk record for a story, replacing any previous one.
pub fn write_risk(store: &dyn ArtifactStore, story_id: StoryId, level: RiskLevel) -> Result<()> {
    let path = ArtifactKind::RiskRecord.path(story_id);
    let body = serde_json::to_string_pretty(&RiskRecord { level })?;
    store.write(&path, &body)?;
    info!(story_id, level = %level, "Risk level recorded");
    Ok(())
}

/// Reads the risk level of a story.
///
/// # Returns
///
/// `None` when no risk record exists. A record without `level` reads as
/// [`RiskLevel::Low`].
///
/// # Errors
///
/// Returns `StorylineError::FileReadError` when the record is malformed or
/// names an unknown level.
pub fn read_risk(store: &dyn ArtifactStore, story_id: StoryId) -> Result<Option<RiskLevel>> {
    let path = ArtifactKind::RiskRecord.path(story_id);
    if !store.exists(&path) {
        return Ok(None);
    }

    let text = store.read_to_string(&path)?;
    let invalid = || StorylineError::FileReadError(format!("invalid risk record {}", path.display()));
    let level = parse_level(&text).ok_or_else(invalid)?;
    match level {
        None => Ok(Some(RiskLevel::Low)),
        Some(raw) => raw.parse().map(Some).map_err(|_| invalid()),
    }
}

/// Extracts the lowercased `level` field from a risk record.
///
/// Outer `None` means the record is malformed (not a JSON object, or a
/// non-string `level`); inner `None` means `level` is absent.
pub(crate) fn parse_level(text: &str) -> Option<Option<String>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    match object.get("level") {
        None => Some(None),
        Some(level) => level.as_str().map(|s| Some(s.to_lowercase())),
    }
}
