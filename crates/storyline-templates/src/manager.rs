//! Template manager implementation using minijinja.

use crate::{
    defaults,
    engine::TemplateEngine,
    error::{Result, TemplateError},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Manager for loading and rendering artifact templates.
///
/// Templates resolve first from the optional override directory and then
/// from the embedded defaults, so a project can replace a single template
/// without copying the whole set.
///
/// # Examples
///
/// ```no_run
/// use storyline_templates::{ArtifactContext, TemplateEngine, TemplateManager};
/// use std::path::PathBuf;
///
/// let manager = TemplateManager::with_override_dir(PathBuf::from(".storyline/templates"))?;
/// let text = manager.render("ux", &ArtifactContext::new(1, "Sign up"))?;
/// # Ok::<(), storyline_templates::TemplateError>(())
/// ```
#[derive(Debug)]
pub struct TemplateManager {
    /// Directory whose `.j2` files take precedence over embedded ones.
    pub override_dir: Option<PathBuf>,
    /// Minijinja environment for template rendering.
    env: minijinja::Environment<'static>,
}

impl TemplateManager {
    /// Creates a manager that renders only the embedded templates.
    pub fn embedded() -> Self {
        Self {
            override_dir: None,
            env: build_env(None),
        }
    }

    /// Creates a manager with an override directory.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::TemplateDirectoryNotFound`] if the directory
    /// does not exist or is not a directory.
    pub fn with_override_dir(dir: PathBuf) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TemplateError::TemplateDirectoryNotFound(dir));
        }

        Ok(Self {
            env: build_env(Some(&dir)),
            override_dir: Some(dir),
        })
    }

    /// Loads a template by name (without the `.j2` extension).
    fn load_template(&self, name: &str) -> Result<minijinja::Template<'_, '_>> {
        let template_name = format!("{name}.j2");
        self.env.get_template(&template_name).map_err(|e| {
            if e.kind() == minijinja::ErrorKind::TemplateNotFound {
                TemplateError::TemplateNotFound(name.to_string())
            } else {
                TemplateError::TemplateRenderError(format!("{name}: {e}"))
            }
        })
    }

    fn override_names(dir: &Path) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(dir).map_err(|source| TemplateError::TemplateListError {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TemplateError::TemplateListError {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file()
                && path.extension().is_some_and(|ext| ext == "j2")
                && let Some(name) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

impl Default for TemplateManager {
    fn default() -> Self {
        Self::embedded()
    }
}

fn build_env(override_dir: Option<&Path>) -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    env.set_keep_trailing_newline(true);

    let fs_loader = override_dir.map(|dir| minijinja::path_loader(dir.to_path_buf()));
    env.set_loader(move |name| {
        if let Some(loader) = &fs_loader
            && let Some(source) = loader(name)?
        {
            return Ok(Some(source));
        }
        Ok(defaults::lookup(name).map(str::to_owned))
    });
    env
}

impl TemplateEngine for TemplateManager {
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String> {
        let tmpl = self.load_template(template)?;
        tmpl.render(ctx)
            .map_err(|e| TemplateError::TemplateRenderError(format!("{template}: {e}")))
    }

    fn list_templates(&self) -> Result<Vec<String>> {
        let mut templates: Vec<String> = defaults::names().map(str::to_string).collect();
        if let Some(dir) = &self.override_dir {
            templates.extend(Self::override_names(dir)?);
        }
        templates.sort();
        templates.dedup();
        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ArtifactContext, ArtifactLink};
    use std::fs;
    use tempfile::TempDir;

    fn sample_context() -> ArtifactContext {
        ArtifactContext::new(4, "Checkout")
            .with_epic(2, "Payments")
            .with_acceptance_criteria(vec![
                "Card is charged once".to_string(),
                "Receipt is emailed".to_string(),
            ])
    }

    #[test]
    fn test_render_embedded_qa_plan() {
        let manager = TemplateManager::embedded();
        let text = manager.render("qa_plan", &sample_context()).unwrap();
        assert!(text.starts_with("# QA Test Plan — Story 4: Checkout"));
        assert!(text.contains("- Card is charged once"));
        assert!(text.contains("- Receipt is emailed"));
    }

    #[test]
    fn test_render_traceability_rows() {
        let manager = TemplateManager::embedded();
        let text = manager.render("traceability", &sample_context()).unwrap();
        assert!(text.contains("| AC-4-1 | Card is charged once | TC-4-1 | Draft |"));
        assert!(text.contains("| AC-4-2 | Receipt is emailed | TC-4-2 | Draft |"));
    }

    #[test]
    fn test_render_traceability_without_criteria() {
        let manager = TemplateManager::embedded();
        let text = manager
            .render("traceability", &ArtifactContext::new(9, "Empty"))
            .unwrap();
        assert!(text.contains("| AC-9-1 | TBD | TC-9-1 | Draft |"));
    }

    #[test]
    fn test_render_shard_links() {
        let manager = TemplateManager::embedded();
        let ctx = sample_context().with_links(vec![
            ArtifactLink {
                label: "UX".to_string(),
                path: Some("docs/ux/story-4.md".to_string()),
            },
            ArtifactLink {
                label: "ADR".to_string(),
                path: None,
            },
        ]);
        let text = manager.render("story_shard", &ctx).unwrap();
        assert!(text.contains("- UX: docs/ux/story-4.md"));
        assert!(text.contains("- ADR: TBD"));
        assert!(text.contains("Epic 2: Payments"));
    }

    #[test]
    fn test_analytics_spec_declares_no_pii() {
        let manager = TemplateManager::embedded();
        let text = manager.render("analytics_spec", &sample_context()).unwrap();
        assert!(text.lines().any(|l| l.trim() == "- PII: none"));
    }

    #[test]
    fn test_render_template_not_found() {
        let manager = TemplateManager::embedded();
        let result = manager.render("nonexistent", &ArtifactContext::default());
        match result.unwrap_err() {
            TemplateError::TemplateNotFound(name) => assert_eq!(name, "nonexistent"),
            other => panic!("expected TemplateNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("ux.j2"), "custom {{ story_id }}").unwrap();

        let manager = TemplateManager::with_override_dir(temp.path().to_path_buf()).unwrap();
        let text = manager.render("ux", &sample_context()).unwrap();
        assert_eq!(text, "custom 4");

        // Templates not overridden still come from the embedded set.
        let adr = manager.render("adr", &sample_context()).unwrap();
        assert!(adr.starts_with("# ADR:"));
    }

    #[test]
    fn test_override_dir_missing() {
        let result = TemplateManager::with_override_dir(PathBuf::from("/nonexistent/templates"));
        assert!(matches!(
            result,
            Err(TemplateError::TemplateDirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_list_templates_merges_overrides() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("ux.j2"), "x").unwrap();
        fs::write(temp.path().join("release_notes.j2"), "y").unwrap();
        fs::write(temp.path().join("README.md"), "ignored").unwrap();

        let manager = TemplateManager::with_override_dir(temp.path().to_path_buf()).unwrap();
        let names = manager.list_templates().unwrap();

        assert_eq!(names.len(), defaults::EMBEDDED.len() + 1);
        assert!(names.contains(&"release_notes".to_string()));
        assert_eq!(names.iter().filter(|n| *n == "ux").count(), 1);
    }
}
