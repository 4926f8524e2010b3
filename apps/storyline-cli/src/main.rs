//! Storyline CLI - backlog workflow engine
//!
//! Command-line interface for Storyline: parse a PRD into a backlog, prepare
//! the planning artifacts of each story, gate stories before implementation
//! and plan sprints.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::path::{Path, PathBuf};
use storyline_core::board::format_status_line;
use storyline_core::{
    Engine, GateVerdict, Phase, PrepareOutcome, Priority, Refinement, ReviewKind, RiskLevel, Runtime,
    SprintOptions, StoryId, StorylineConfig,
};
use tracing::{debug, error};

/// Storyline - PRD to gated, sprint-planned backlog
#[derive(Parser)]
#[command(name = "storyline", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available Storyline commands
#[derive(Subcommand)]
enum Commands {
    /// Parse a PRD into the backlog
    ///
    /// Writes docs/backlog.json and docs/epics.md. An existing backlog is
    /// replaced and kept as docs/backlog.backup.json.
    Plan {
        /// PRD markdown file
        prd: PathBuf,
    },

    /// Create the missing artifacts of a story and evaluate its gate
    Prepare {
        /// Story id
        id: StoryId,

        /// Also create features/story-<id>/README.md
        #[arg(long)]
        scaffold: bool,
    },

    /// Evaluate the gate of a story without creating anything
    Gate {
        /// Story id
        id: StoryId,
    },

    /// Pack the backlog into sprints
    Sprints {
        /// Points per sprint (defaults to the configured capacity)
        #[arg(long)]
        capacity: Option<f64>,

        /// Sprint length in weeks
        #[arg(long)]
        weeks: Option<u32>,

        /// Plan from heuristically enriched estimates and priorities
        #[arg(long)]
        enriched: bool,
    },

    /// Scaffold a story and make it the current one
    Start {
        /// Story id
        id: StoryId,
    },

    /// Prepare the current story, or pick the next ready one
    Next {
        /// Also create the story scaffold
        #[arg(long)]
        scaffold: bool,
    },

    /// Show or switch the delivery phase
    Phase {
        #[command(subcommand)]
        command: PhaseCommand,
    },

    /// Record or show the risk level of a story
    Risk {
        #[command(subcommand)]
        command: RiskCommand,
    },

    /// Write a conditional review document for a story
    Review {
        /// Story id
        id: StoryId,

        /// privacy, qa-design, architecture or runbook
        kind: ReviewKind,
    },

    /// Generate, refine or accept enriched backlog proposals
    Proposals {
        #[command(subcommand)]
        command: ProposalCommand,
    },

    /// Scan the whole project and write docs/analyst/quality-audit.md
    Audit,

    /// Re-check the gate of a story in the sustain phase
    Sustain {
        /// Story id
        id: StoryId,
    },

    /// Write the status board
    Board,

    /// Show the timeline of a story, or of the assess phase
    Timeline {
        /// Story id (omit for the assess timeline)
        id: Option<StoryId>,
    },
}

#[derive(Subcommand)]
enum PhaseCommand {
    /// Switch to assess, develop or sustain
    Set { phase: Phase },
    /// Show the current phase and story
    Status,
}

#[derive(Subcommand)]
enum RiskCommand {
    /// Record low, medium or high
    Set { id: StoryId, level: RiskLevel },
    /// Show the recorded level
    Status { id: StoryId },
}

#[derive(Subcommand)]
enum ProposalCommand {
    /// Write docs/proposals/proposed-backlog.{json,md}
    Gen,
    /// Merge proposed estimates and priorities into the backlog
    Accept {
        /// Only accept these story ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<StoryId>,
    },
    /// Edit the proposal before accepting it
    Refine {
        /// Keep only these story ids
        #[arg(long, value_delimiter = ',')]
        accept: Vec<StoryId>,

        /// Drop these story ids
        #[arg(long, value_delimiter = ',')]
        reject: Vec<StoryId>,

        /// Override estimates, as id=points
        #[arg(long, value_delimiter = ',', value_parser = parse_key_val::<StoryId, f64>)]
        estimate: Vec<(StoryId, f64)>,

        /// Override priorities, as id=must|should|could
        #[arg(long, value_delimiter = ',', value_parser = parse_key_val::<StoryId, Priority>)]
        priority: Vec<(StoryId, Priority)>,
    },
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Parses a single `key=value` pair.
fn parse_key_val<T, U>(s: &str) -> std::result::Result<(T, U), BoxError>
where
    T: FromStr,
    T::Err: Into<BoxError>,
    U: FromStr,
    U::Err: Into<BoxError>,
{
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    Ok((
        key.trim().parse().map_err(Into::<BoxError>::into)?,
        value.trim().parse().map_err(Into::<BoxError>::into)?,
    ))
}

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber for structured logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default = if verbose {
        "storyline=debug,storyline_core=debug,storyline_templates=debug"
    } else {
        "storyline=info,storyline_core=info,storyline_templates=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let root = match cli.root {
        Some(root) => absolute(&cwd, &root),
        None => cwd.clone(),
    };
    debug!(root = %root.display(), "Project root");

    let config = StorylineConfig::load(root).context("Failed to load Storyline configuration")?;
    let engine = Engine::new(config).context("Failed to create engine")?;

    match cli.command {
        Commands::Plan { prd } => run_plan(&engine, &absolute(&cwd, &prd)),
        Commands::Prepare { id, scaffold } => run_prepare(&engine, id, scaffold),
        Commands::Gate { id } => {
            let verdict = engine.gate(id).context("Gate evaluation failed")?;
            print_verdict(&verdict);
            Ok(())
        }
        Commands::Sprints {
            capacity,
            weeks,
            enriched,
        } => run_sprints(
            &engine,
            SprintOptions {
                capacity,
                weeks,
                enriched,
            },
        ),
        Commands::Start { id } => {
            let scaffold = engine
                .start(id)
                .with_context(|| format!("Failed to start story {id}"))?;
            println!("✔ Story {id} is now current");
            println!("  Scaffold: {} ({})", scaffold.path, created_label(scaffold.created));
            Ok(())
        }
        Commands::Next { scaffold } => match engine.next(scaffold).context("Failed to continue")? {
            Some(outcome) => {
                print_prepare(&engine, &outcome)?;
                Ok(())
            }
            None => {
                println!("No story is ready: every story has unmet dependencies.");
                Ok(())
            }
        },
        Commands::Phase { command } => run_phase(&engine, command),
        Commands::Risk { command } => run_risk(&engine, command),
        Commands::Review { id, kind } => {
            let review = engine
                .review(id, kind)
                .with_context(|| format!("Failed to write review for story {id}"))?;
            println!("{} ({})", review.path, created_label(review.created));
            Ok(())
        }
        Commands::Proposals { command } => run_proposals(&engine, command),
        Commands::Audit => {
            let report = engine.audit().context("Quality audit failed")?;
            let severity = report.severity;
            println!(
                "Semgrep: high={}, medium={}, low={} ({})",
                severity.high,
                severity.medium,
                severity.low,
                report.static_analysis.as_str()
            );
            println!(
                "Gitleaks: findings={} ({})",
                report.secrets,
                report.secrets_scan.as_str()
            );
            println!("Audit written: {}", report.path.display());
            Ok(())
        }
        Commands::Sustain { id } => {
            let verdict = engine
                .sustain(id)
                .with_context(|| format!("Sustain check failed for story {id}"))?;
            println!("Sustain: Gate {}", verdict.label());
            for issue in &verdict.issues {
                println!("- {issue}");
            }
            let state = engine.state()?;
            println!(
                "{}",
                format_status_line(
                    state.phase.as_str(),
                    "sPM",
                    &[],
                    &[],
                    &verdict.checked_paths,
                    Some(verdict.label()),
                )
            );
            Ok(())
        }
        Commands::Board => {
            let path = engine.board().context("Failed to write status board")?;
            println!("Board written: {}", path.display());
            Ok(())
        }
        Commands::Timeline { id } => {
            match engine.timeline(id).context("Failed to read timeline")? {
                Some(text) => print!("{text}"),
                None => println!("No timeline yet."),
            }
            Ok(())
        }
    }
}

fn run_plan(engine: &Engine, prd: &Path) -> Result<()> {
    let summary = engine
        .plan(prd)
        .with_context(|| format!("Failed to plan from {}", prd.display()))?;

    println!(
        "Backlog generated: {}, {} ({} epics, {} stories)",
        summary.backlog_path.display(),
        summary.epics_path.display(),
        summary.epics,
        summary.stories
    );
    if let Some(backup) = summary.backup_path {
        println!("  Previous backlog kept at {}", backup.display());
    }
    println!("\nNext steps:");
    println!("  storyline prepare <id>    Prepare a story's artifacts");
    println!("  storyline sprints         Plan sprints");
    Ok(())
}

fn run_prepare(engine: &Engine, id: StoryId, scaffold: bool) -> Result<()> {
    let outcome = engine
        .prepare_story(id, scaffold)
        .with_context(|| format!("Failed to prepare story {id}"))?;
    print_prepare(engine, &outcome)
}

fn print_prepare(engine: &Engine, outcome: &PrepareOutcome) -> Result<()> {
    println!("Story {}", outcome.story_id);
    for path in &outcome.created_paths {
        println!("  + {path}");
    }
    for path in &outcome.existing_paths {
        println!("  = {path}");
    }
    if let Some(scaffold) = &outcome.scaffold_path {
        println!("  Scaffold: {scaffold}");
    }

    print_gate(outcome.gate_pass, &outcome.issues);

    let state = engine.state()?;
    println!(
        "{}",
        format_status_line(
            state.phase.as_str(),
            "PM",
            &outcome.agents_used,
            &outcome.created_paths,
            &outcome.checked_paths,
            Some(outcome.gate_label()),
        )
    );
    Ok(())
}

fn print_verdict(verdict: &GateVerdict) {
    print_gate(verdict.pass, &verdict.issues);
}

fn print_gate(pass: bool, issues: &[String]) {
    if pass {
        println!("Gate: PASS");
    } else {
        println!("Gate: FAIL");
        for issue in issues {
            println!("- {issue}");
        }
    }
}

fn run_sprints(engine: &Engine, options: SprintOptions) -> Result<()> {
    let plan = engine.plan_sprints(options).context("Sprint planning failed")?;
    if plan.batches.is_empty() {
        println!("Backlog is empty; no sprints planned.");
    }
    for batch in &plan.batches {
        println!(
            "- Sprint {}: {}/{} ({} stories)",
            batch.number,
            batch.points,
            plan.capacity,
            batch.stories.len()
        );
    }
    if let Some(index) = plan.written.last() {
        println!("Sprint plan written: {}", index.display());
    }
    Ok(())
}

fn run_phase(engine: &Engine, command: PhaseCommand) -> Result<()> {
    let state = match command {
        PhaseCommand::Set { phase } => engine.set_phase(phase).context("Failed to set phase")?,
        PhaseCommand::Status => engine.state().context("Failed to read workflow state")?,
    };
    println!("Phase: {} (role: {})", state.phase, state.active_role);
    match state.current_story_id {
        Some(id) => println!("Current story: {id}"),
        None => println!("Current story: -"),
    }
    println!("Recommended roles: {}", state.recommended_roles().join(", "));
    Ok(())
}

fn run_risk(engine: &Engine, command: RiskCommand) -> Result<()> {
    match command {
        RiskCommand::Set { id, level } => {
            engine
                .set_risk(id, level)
                .with_context(|| format!("Failed to record risk for story {id}"))?;
            println!("Story {id} risk: {level}");
        }
        RiskCommand::Status { id } => match engine.risk(id)? {
            Some(level) => println!("Story {id} risk: {level}"),
            None => println!("Story {id} risk: not recorded"),
        },
    }
    Ok(())
}

fn run_proposals(engine: &Engine, command: ProposalCommand) -> Result<()> {
    match command {
        ProposalCommand::Gen => {
            let (_, written) = engine
                .generate_proposals()
                .context("Failed to generate proposals")?;
            for path in written {
                println!("Proposal written: {}", path.display());
            }
        }
        ProposalCommand::Accept { ids } => {
            let only: BTreeSet<StoryId> = ids.into_iter().collect();
            let summary = engine
                .accept_proposals(&only)
                .context("Failed to accept proposals")?;
            println!(
                "Merged proposals into the backlog (backup: {}); updated stories: {:?}",
                summary.backup_path.display(),
                summary.updated
            );
        }
        ProposalCommand::Refine {
            accept,
            reject,
            estimate,
            priority,
        } => {
            let refinement = Refinement {
                accept: accept.into_iter().collect(),
                reject: reject.into_iter().collect(),
                estimates: estimate.into_iter().collect(),
                priorities: priority.into_iter().collect(),
            };
            let (proposed, written) = engine
                .refine_proposals(&refinement)
                .context("Failed to refine proposals")?;
            println!("Proposals refined: {} stories", proposed.story_count());
            for path in written {
                println!("Proposal written: {}", path.display());
            }
        }
    }
    Ok(())
}

fn created_label(created: bool) -> &'static str {
    if created { "created" } else { "exists" }
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
