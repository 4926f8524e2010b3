//! Backlog data model: epics, stories and priorities.
//!
//! The JSON encoding of [`Backlog`] is the backlog store contract:
//! `{ "epics": [ { id, title, description, stories: [...] } ] }`. Absent
//! optional fields decode to their defaults so hand-edited backlogs load.

use crate::error::{Result, StorylineError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Story identifier, unique across the whole backlog.
pub type StoryId = u32;

/// Epic identifier.
pub type EpicId = u32;

/// Story priority, in planning order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Required for the release.
    Must,
    /// Expected, but can slip.
    #[default]
    Should,
    /// Nice to have.
    Could,
}

impl Priority {
    /// All priorities in planning order.
    pub const ALL: [Priority; 3] = [Priority::Must, Priority::Should, Priority::Could];

    /// Returns the string value used in the backlog store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Must => "must",
            Priority::Should => "should",
            Priority::Could => "could",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "must" => Ok(Priority::Must),
            "should" => Ok(Priority::Should),
            "could" => Ok(Priority::Could),
            other => Err(format!("invalid priority: {other}")),
        }
    }
}

/// An atomic backlog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Unique story id.
    pub id: StoryId,

    /// Owning epic id.
    pub epic_id: EpicId,

    /// Short title.
    pub title: String,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Acceptance criteria; empty means undefined.
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    /// Estimate in points, if set.
    #[serde(default)]
    pub estimate: Option<f64>,

    /// Planning priority.
    #[serde(default)]
    pub priority: Priority,

    /// Ids of stories this one waits on.
    #[serde(default)]
    pub dependencies: BTreeSet<StoryId>,

    /// Free-text risks.
    #[serde(default)]
    pub risks: Vec<String>,

    // Status board fields, display only.
    /// Current workflow phase label.
    #[serde(default)]
    pub phase: Option<String>,

    /// Role currently holding the story.
    #[serde(default)]
    pub owner: Option<String>,

    /// Role the story goes to next.
    #[serde(default)]
    pub next_owner: Option<String>,

    /// Last gate verdict label.
    #[serde(default)]
    pub gate: Option<String>,
}

impl Story {
    /// Creates a story with defaults for every optional field.
    pub fn new(id: StoryId, epic_id: EpicId, title: impl Into<String>) -> Self {
        Self {
            id,
            epic_id,
            title: title.into(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            estimate: None,
            priority: Priority::default(),
            dependencies: BTreeSet::new(),
            risks: Vec::new(),
            phase: None,
            owner: None,
            next_owner: None,
            gate: None,
        }
    }

    /// Points used for capacity planning; unestimated stories count as 1.
    pub fn points(&self) -> f64 {
        self.estimate.unwrap_or(1.0)
    }
}

/// A top-level grouping of stories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    /// Unique epic id.
    pub id: EpicId,

    /// Title from the PRD section heading.
    pub title: String,

    /// Section text outside the stories and acceptance blocks.
    #[serde(default)]
    pub description: String,

    /// Owned stories in PRD order.
    #[serde(default)]
    pub stories: Vec<Story>,
}

/// Ordered list of epics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Backlog {
    /// Epics in PRD order.
    #[serde(default)]
    pub epics: Vec<Epic>,
}

impl Backlog {
    /// Iterates stories in epic-then-story order.
    pub fn stories(&self) -> impl Iterator<Item = &Story> {
        self.epics.iter().flat_map(|e| e.stories.iter())
    }

    /// Number of stories across all epics.
    pub fn story_count(&self) -> usize {
        self.epics.iter().map(|e| e.stories.len()).sum()
    }

    /// Finds a story by id.
    pub fn find_story(&self, id: StoryId) -> Option<&Story> {
        self.stories().find(|s| s.id == id)
    }

    /// Finds a story by id for mutation.
    pub fn find_story_mut(&mut self, id: StoryId) -> Option<&mut Story> {
        self.epics
            .iter_mut()
            .flat_map(|e| e.stories.iter_mut())
            .find(|s| s.id == id)
    }

    /// Finds the epic owning a story.
    pub fn epic_of(&self, story: &Story) -> Option<&Epic> {
        self.epics.iter().find(|e| e.id == story.epic_id)
    }

    /// Encodes the backlog as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes a backlog from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(StorylineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_backlog() -> Backlog {
        let mut s1 = Story::new(1, 1, "Sign up");
        s1.acceptance_criteria = vec!["Email is verified".to_string()];
        s1.priority = Priority::Must;
        s1.estimate = Some(3.0);
        let mut s2 = Story::new(2, 1, "Sign in");
        s2.dependencies.insert(1);
        let s3 = Story::new(3, 2, "Export");

        Backlog {
            epics: vec![
                Epic {
                    id: 1,
                    title: "Accounts".to_string(),
                    description: "User accounts".to_string(),
                    stories: vec![s1, s2],
                },
                Epic {
                    id: 2,
                    title: "Reports".to_string(),
                    description: String::new(),
                    stories: vec![s3],
                },
            ],
        }
    }

    #[test]
    fn test_json_round_trip() {
        let backlog = sample_backlog();
        let json = backlog.to_json().unwrap();
        let decoded = Backlog::from_json(&json).unwrap();
        assert_eq!(decoded, backlog);
    }

    #[test]
    fn test_priority_serializes_as_string() {
        let json = sample_backlog().to_json().unwrap();
        assert!(json.contains("\"priority\": \"must\""));
        assert!(json.contains("\"priority\": \"should\""));
    }

    #[test]
    fn test_missing_optional_fields_decode_to_defaults() {
        let json = r#"{"epics":[{"id":1,"title":"E","stories":[{"id":5,"epic_id":1,"title":"S"}]}]}"#;
        let backlog = Backlog::from_json(json).unwrap();
        let story = backlog.find_story(5).unwrap();
        assert_eq!(story.description, "");
        assert!(story.acceptance_criteria.is_empty());
        assert_eq!(story.estimate, None);
        assert_eq!(story.priority, Priority::Should);
        assert!(story.dependencies.is_empty());
        assert_eq!(story.phase, None);
        assert_eq!(backlog.epics[0].description, "");
    }

    #[test]
    fn test_invalid_priority_is_rejected() {
        let json = r#"{"epics":[{"id":1,"title":"E","stories":[{"id":1,"epic_id":1,"title":"S","priority":"urgent"}]}]}"#;
        assert!(matches!(
            Backlog::from_json(json),
            Err(StorylineError::Json(_))
        ));
    }

    #[test]
    fn test_traversal_and_lookup() {
        let backlog = sample_backlog();
        let ids: Vec<_> = backlog.stories().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(backlog.story_count(), 3);
        assert_eq!(backlog.find_story(3).unwrap().title, "Export");
        assert!(backlog.find_story(99).is_none());

        let story = backlog.find_story(2).unwrap();
        assert_eq!(backlog.epic_of(story).unwrap().title, "Accounts");
    }

    #[test]
    fn test_find_story_mut() {
        let mut backlog = sample_backlog();
        backlog.find_story_mut(3).unwrap().gate = Some("PASS".to_string());
        assert_eq!(backlog.find_story(3).unwrap().gate.as_deref(), Some("PASS"));
    }

    #[test]
    fn test_points_default_to_one() {
        let backlog = sample_backlog();
        assert_eq!(backlog.find_story(1).unwrap().points(), 3.0);
        assert_eq!(backlog.find_story(2).unwrap().points(), 1.0);
    }

    #[test]
    fn test_priority_parse_and_order() {
        assert_eq!("MUST".parse::<Priority>(), Ok(Priority::Must));
        assert_eq!(" could ".parse::<Priority>(), Ok(Priority::Could));
        assert!("later".parse::<Priority>().is_err());
        assert!(Priority::Must < Priority::Should);
        assert!(Priority::Should < Priority::Could);
    }
}
