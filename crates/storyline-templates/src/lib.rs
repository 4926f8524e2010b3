//! Template crate for Storyline.
//!
//! This crate renders the per-role planning artifacts (UX docs, ADRs, QA
//! plans, threat models and so on) using minijinja. Every template ships
//! embedded in the binary; a project may override any of them by placing a
//! file with the same name in its template directory.
//!
//! # Examples
//!
//! ```
//! use storyline_templates::{ArtifactContext, TemplateEngine, TemplateManager};
//!
//! let manager = TemplateManager::embedded();
//! let context = ArtifactContext::new(7, "Export reports")
//!     .with_acceptance_criteria(vec!["CSV download works".to_string()]);
//!
//! let text = manager.render("qa_plan", &context)?;
//! assert!(text.contains("Story 7"));
//! # Ok::<(), storyline_templates::TemplateError>(())
//! ```

pub mod context;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod manager;

pub use context::{ArtifactContext, ArtifactLink};
pub use engine::TemplateEngine;
pub use error::{Result, TemplateError};
pub use manager::TemplateManager;
