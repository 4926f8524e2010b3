//! Storyline Core - backlog workflow engine.
//!
//! This crate turns a PRD into a backlog of epics and stories, drives the
//! per-story generation of planning artifacts, gates each story on the
//! completeness of those artifacts, and packs the backlog into sprints.
//!
//! # Architecture
//!
//! The core crate is organized into several modules:
//!
//! - [`model`]: Backlog, epics and stories
//! - [`parser`]: PRD markdown to backlog
//! - [`orchestrator`]: The per-story artifact pipeline
//! - [`gate`]: Completeness gate evaluator
//! - [`audit`]: Project-wide quality audit
//! - [`sprint`]: Capacity-bounded sprint planning
//! - [`tools`]: Artifact store and shell adapters
//! - [`runtime`]: The [`Engine`] facade used by the CLI
//!
//! # Example
//!
//! ```
//! use storyline_core::{ArtifactStore, MemoryArtifactStore, gate, parser};
//!
//! let backlog = parser::parse_prd("## Accounts\n### Stories\n- Sign in\n");
//! let store = MemoryArtifactStore::new();
//!
//! let verdict = gate::evaluate(&backlog, 1, &store);
//! assert!(!verdict.pass);
//! assert_eq!(verdict.issues[0], "Acceptance criteria missing");
//! assert!(!store.exists(std::path::Path::new("docs/ux/story-1.md")));
//! ```

pub mod audit;
pub mod board;
pub mod config;
pub mod enrich;
pub mod error;
pub mod gate;
pub mod generate;
pub mod journal;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod paths;
pub mod risk;
pub mod runtime;
pub mod scan;
pub mod sprint;
pub mod state;
pub mod storage;
pub mod tools;

// Re-export core types for convenience
pub use audit::AuditReport;
pub use enrich::Refinement;
pub use config::{ScannerConfig, SprintConfig, StorylineConfig};
pub use error::{Result, StorylineError};
pub use gate::GateVerdict;
pub use model::{Backlog, Epic, EpicId, Priority, Story, StoryId};
pub use orchestrator::{Orchestrator, PrepareOutcome, ReviewKind, ReviewOutcome};
pub use paths::ArtifactKind;
pub use risk::RiskLevel;
pub use runtime::{AcceptSummary, Engine, PlanSummary, Runtime, SprintOptions, SprintPlan};
pub use sprint::SprintBatch;
pub use state::{Phase, WorkflowState};
pub use tools::ToolRegistry;
pub use tools::store::ArtifactStore;
pub use tools::store_memory::MemoryArtifactStore;
