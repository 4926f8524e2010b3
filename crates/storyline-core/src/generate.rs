//! Per-story artifact generators.
//!
//! A generator turns a story into the text of one artifact. Generators may
//! see whether sibling artifacts exist (to link them) but never their
//! content. The standard set renders embedded templates through
//! `storyline-templates`.

use crate::error::Result;
use crate::model::{Story, StoryId};
use crate::paths::{self, ArtifactKind};
use crate::tools::store::ArtifactStore;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use storyline_templates::{ArtifactContext, ArtifactLink, TemplateEngine, TemplateManager};
use tracing::debug;

/// Read-only existence view over the artifact store.
#[derive(Clone, Copy)]
pub struct ExistenceView<'a> {
    store: &'a dyn ArtifactStore,
}

impl<'a> ExistenceView<'a> {
    pub fn new(store: &'a dyn ArtifactStore) -> Self {
        Self { store }
    }

    /// Checks whether an artifact of `kind` exists for `id`.
    pub fn exists(&self, kind: ArtifactKind, id: StoryId) -> bool {
        self.store.exists(&kind.path(id))
    }
}

/// Everything a generator may use.
pub struct GenerationContext<'a> {
    pub story: &'a Story,
    pub epic_title: &'a str,
    pub artifacts: ExistenceView<'a>,
}

impl GenerationContext<'_> {
    /// Link to a sibling artifact; the path is `None` while it is missing.
    pub fn link(&self, kind: ArtifactKind) -> ArtifactLink {
        let id = self.story.id;
        ArtifactLink {
            label: kind.label().to_string(),
            path: self
                .artifacts
                .exists(kind, id)
                .then(|| kind.path_string(id)),
        }
    }

    fn template_context(&self, links: &[ArtifactKind]) -> ArtifactContext {
        let story = self.story;
        ArtifactContext::new(story.id, story.title.clone())
            .with_epic(story.epic_id, self.epic_title)
            .with_description(story.description.clone())
            .with_acceptance_criteria(story.acceptance_criteria.clone())
            .with_planning(story.priority.as_str(), story.estimate)
            .with_risks(story.risks.clone())
            .with_date(Utc::now().format("%Y-%m-%d").to_string())
            .with_links(links.iter().map(|kind| self.link(*kind)).collect())
    }
}

/// Produces the content of one kind of artifact.
pub trait ArtifactGenerator: Send + Sync {
    /// Artifact kind this generator writes.
    fn kind(&self) -> ArtifactKind;

    /// Role credited for the artifact.
    fn role(&self) -> &str;

    /// Renders the artifact body.
    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<String>;
}

/// Generator backed by one template.
pub struct TemplateGenerator {
    kind: ArtifactKind,
    template: &'static str,
    role: &'static str,
    links: &'static [ArtifactKind],
    templates: Arc<TemplateManager>,
}

impl TemplateGenerator {
    /// Creates a generator for `kind`.
    ///
    /// Returns `None` for kinds that are not rendered documents.
    pub fn new(
        kind: ArtifactKind,
        role: &'static str,
        links: &'static [ArtifactKind],
        templates: Arc<TemplateManager>,
    ) -> Option<Self> {
        Some(Self {
            kind,
            template: kind.template()?,
            role,
            links,
            templates,
        })
    }
}

impl ArtifactGenerator for TemplateGenerator {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn role(&self) -> &str {
        self.role
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<String> {
        debug!(template = self.template, story_id = ctx.story.id, "Rendering artifact");
        let context = ctx.template_context(self.links);
        Ok(self.templates.render(self.template, &context)?)
    }
}

const TRACE_LINKS: &[ArtifactKind] = &[ArtifactKind::QaPlan];

const SHARD_LINKS: &[ArtifactKind] = &[
    ArtifactKind::Ux,
    ArtifactKind::Adr,
    ArtifactKind::DeepPlan,
    ArtifactKind::QaPlan,
    ArtifactKind::Traceability,
    ArtifactKind::ThreatModel,
    ArtifactKind::DevOpsPlan,
    ArtifactKind::AnalyticsSpec,
    ArtifactKind::StaticAnalysisReport,
    ArtifactKind::SecretsReport,
];

/// Role credited for each standard kind.
pub fn role_for(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Ux => "UX",
        ArtifactKind::Adr | ArtifactKind::ArchitectureReview => "Architecture",
        ArtifactKind::DeepPlan => "Planning",
        ArtifactKind::QaPlan
        | ArtifactKind::Traceability
        | ArtifactKind::QaDesignReview
        | ArtifactKind::RiskRecord => "QA",
        ArtifactKind::ThreatModel
        | ArtifactKind::StaticAnalysisReport
        | ArtifactKind::SecretsReport
        | ArtifactKind::PrivacyReview => "Security",
        ArtifactKind::DevOpsPlan | ArtifactKind::DevOpsRunbook => "DevOps",
        ArtifactKind::AnalyticsSpec => "Data",
        ArtifactKind::StoryShard => "PM",
    }
}

/// Builds the template-backed generator for `kind`.
pub fn standard_generator(
    kind: ArtifactKind,
    templates: &Arc<TemplateManager>,
) -> Option<Box<dyn ArtifactGenerator>> {
    let links = match kind {
        ArtifactKind::Traceability => TRACE_LINKS,
        ArtifactKind::StoryShard => SHARD_LINKS,
        _ => &[],
    };
    TemplateGenerator::new(kind, role_for(kind), links, Arc::clone(templates))
        .map(|g| Box::new(g) as Box<dyn ArtifactGenerator>)
}

/// Outcome of scaffolding one story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldOutcome {
    /// README path, forward-slash relative.
    pub path: String,
    /// `false` when the scaffold already existed.
    pub created: bool,
}

/// Writes `{features_dir}/story-{id}/README.md` for a story, once.
pub struct Scaffolder {
    features_dir: String,
    templates: Arc<TemplateManager>,
}

impl Scaffolder {
    pub fn new(features_dir: &Path, templates: Arc<TemplateManager>) -> Self {
        Self {
            features_dir: paths::to_slash(features_dir),
            templates,
        }
    }

    /// Creates the scaffold if it does not exist yet.
    pub fn scaffold(&self, store: &dyn ArtifactStore, story: &Story, epic_title: &str) -> Result<ScaffoldOutcome> {
        let readme = paths::scaffold_readme(&self.features_dir, story.id);
        let path = paths::to_slash(&readme);
        if store.exists(&readme) {
            return Ok(ScaffoldOutcome {
                path,
                created: false,
            });
        }

        let ctx = GenerationContext {
            story,
            epic_title,
            artifacts: ExistenceView::new(store),
        };
        let body = self
            .templates
            .render("scaffold_readme", &ctx.template_context(&[]))?;
        let created = store.write_if_absent(&readme, &body)?;
        Ok(ScaffoldOutcome { path, created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::store_memory::MemoryArtifactStore;

    fn story() -> Story {
        let mut story = Story::new(5, 2, "Checkout");
        story.acceptance_criteria = vec!["Card is charged".to_string()];
        story
    }

    fn templates() -> Arc<TemplateManager> {
        Arc::new(TemplateManager::embedded())
    }

    #[test]
    fn test_every_required_kind_has_generator() {
        let templates = templates();
        for kind in ArtifactKind::REQUIRED {
            let generator = standard_generator(kind, &templates).unwrap();
            assert_eq!(generator.kind(), kind);
        }
        assert!(standard_generator(ArtifactKind::SecretsReport, &templates).is_none());
    }

    #[test]
    fn test_roles() {
        assert_eq!(role_for(ArtifactKind::Adr), "Architecture");
        assert_eq!(role_for(ArtifactKind::Traceability), "QA");
        assert_eq!(role_for(ArtifactKind::StoryShard), "PM");
        assert_eq!(role_for(ArtifactKind::StaticAnalysisReport), "Security");
    }

    #[test]
    fn test_shard_links_follow_existence() {
        let store = MemoryArtifactStore::new();
        store.write(&ArtifactKind::Ux.path(5), "ux").unwrap();
        let story = story();
        let ctx = GenerationContext {
            story: &story,
            epic_title: "Payments",
            artifacts: ExistenceView::new(&store),
        };

        let generator = standard_generator(ArtifactKind::StoryShard, &templates()).unwrap();
        let text = generator.generate(&ctx).unwrap();

        assert!(text.contains("- UX: docs/ux/story-5.md"));
        assert!(text.contains("- ADR: TBD"));
        assert!(text.contains("- Secrets Report: TBD"));
        assert!(text.contains("Epic 2: Payments"));
    }

    #[test]
    fn test_scaffold_is_idempotent() {
        let store = MemoryArtifactStore::new();
        let scaffolder = Scaffolder::new(Path::new("features"), templates());

        let first = scaffolder.scaffold(&store, &story(), "Payments").unwrap();
        assert_eq!(first.path, "features/story-5/README.md");
        assert!(first.created);

        store
            .write(Path::new("features/story-5/README.md"), "edited")
            .unwrap();
        let second = scaffolder.scaffold(&store, &story(), "Payments").unwrap();
        assert!(!second.created);
        assert_eq!(
            store
                .read_to_string(Path::new("features/story-5/README.md"))
                .unwrap(),
            "edited"
        );
    }

    #[test]
    fn test_scaffold_uses_configured_features_dir() {
        let store = MemoryArtifactStore::new();
        let scaffolder = Scaffolder::new(Path::new("app/features"), templates());

        let outcome = scaffolder.scaffold(&store, &story(), "Payments").unwrap();

        assert_eq!(outcome.path, "app/features/story-5/README.md");
        assert!(store.exists(Path::new("app/features/story-5/README.md")));
        assert!(!store.exists(Path::new("features/story-5")));
    }
}
