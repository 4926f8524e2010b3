//! Context structures for artifact rendering.

use serde::Serialize;

/// A link from one artifact to another, by path.
///
/// `path` is `None` when the linked artifact does not exist yet; templates
/// render that as `TBD`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactLink {
    /// Human-readable label (e.g. "QA Plan").
    pub label: String,
    /// Relative path of the linked artifact, if it exists.
    pub path: Option<String>,
}

/// Context data provided to artifact templates.
///
/// Carries the story fields a template may print plus links to other
/// artifacts of the same story. Templates never see the *content* of other
/// artifacts, only whether they exist and where.
///
/// # Examples
///
/// ```
/// use storyline_templates::ArtifactContext;
///
/// let context = ArtifactContext::new(3, "Password reset")
///     .with_epic(1, "Accounts")
///     .with_description("Users can reset a forgotten password.");
/// assert_eq!(context.story_id, 3);
/// assert_eq!(context.epic_title, "Accounts");
/// ```
#[derive(Debug, Clone, Serialize, Default)]
pub struct ArtifactContext {
    /// Story identifier.
    pub story_id: u32,

    /// Owning epic identifier.
    pub epic_id: u32,

    /// Owning epic title.
    pub epic_title: String,

    /// Story title.
    pub title: String,

    /// Story description (may be empty).
    pub description: String,

    /// Acceptance criteria in backlog order.
    pub acceptance_criteria: Vec<String>,

    /// Priority as its string value (`must`, `should`, `could`).
    pub priority: String,

    /// Estimate in points, if set.
    pub estimate: Option<f64>,

    /// Free-text risks recorded on the story.
    pub risks: Vec<String>,

    /// Render date (`YYYY-MM-DD`).
    pub date: String,

    /// Links to sibling artifacts.
    pub links: Vec<ArtifactLink>,
}

impl ArtifactContext {
    /// Creates a context with the minimal required fields.
    #[must_use]
    pub fn new(story_id: u32, title: impl Into<String>) -> Self {
        Self {
            story_id,
            title: title.into(),
            priority: "should".to_string(),
            ..Default::default()
        }
    }

    /// Sets the owning epic.
    #[must_use]
    pub fn with_epic(mut self, epic_id: u32, epic_title: impl Into<String>) -> Self {
        self.epic_id = epic_id;
        self.epic_title = epic_title.into();
        self
    }

    /// Sets the story description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the acceptance criteria.
    #[must_use]
    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    /// Sets priority and estimate.
    #[must_use]
    pub fn with_planning(mut self, priority: impl Into<String>, estimate: Option<f64>) -> Self {
        self.priority = priority.into();
        self.estimate = estimate;
        self
    }

    /// Sets the story risks.
    #[must_use]
    pub fn with_risks(mut self, risks: Vec<String>) -> Self {
        self.risks = risks;
        self
    }

    /// Sets the render date.
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// Sets the sibling artifact links.
    #[must_use]
    pub fn with_links(mut self, links: Vec<ArtifactLink>) -> Self {
        self.links = links;
        self
    }
}
