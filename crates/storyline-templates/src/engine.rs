//! Core template engine trait definition.

use crate::error::Result;
use serde::Serialize;

/// Trait for rendering artifact templates with dynamic context.
///
/// Implementations resolve a template by name, render it against any
/// serializable context, and can enumerate what they are able to render.
pub trait TemplateEngine {
    /// Renders a template with the provided context.
    ///
    /// # Arguments
    ///
    /// * `template` - Name of the template to render (without the `.j2` extension)
    /// * `ctx` - Context data to use for rendering
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::TemplateNotFound`](crate::TemplateError::TemplateNotFound)
    /// when no template has that name, or
    /// [`TemplateError::TemplateRenderError`](crate::TemplateError::TemplateRenderError)
    /// when the template has syntax errors or rendering fails.
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String>;

    /// Lists all available template names, sorted and without extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if an override directory is configured and cannot be read.
    fn list_templates(&self) -> Result<Vec<String>>;
}
