//! hadroplan CLI.
//!
//! Wires the console, the chat client, the checkpoint store and the stage
//! orchestrator together, runs the elicitation to completion, and writes
//! the job description.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hadroplan::config::{self, ResumeMode, StrategyChoice};
use hadroplan::console::{ConsolePrompter, Prompter};
use hadroplan::llm::OpenAiChatClient;
use hadroplan::pipeline::approval::{Approver, PrompterApprover, ProxyResponder};
use hadroplan::pipeline::{Orchestrator, Transcript};
use hadroplan::render;
use hadroplan::state::checkpoint::CheckpointStore;
use hadroplan::state::JobState;

#[derive(Parser)]
#[command(name = config::APP_NAME)]
#[command(version = config::APP_VERSION)]
#[command(about = "Turn a free-text lattice QCD measurement request into a job description", long_about = None)]
struct Cli {
    /// The measurement request. Asked for interactively when omitted.
    query: Option<String>,

    /// Reload a prior run's checkpoint before starting
    #[arg(long, value_enum, default_value_t = ResumeMode::Never)]
    resume: ResumeMode,

    /// Checkpoint file for this run
    #[arg(long, default_value = config::DEFAULT_CHECKPOINT_FILE)]
    checkpoint: PathBuf,

    /// Output job description file
    #[arg(short, long, default_value = config::DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// Run identifier embedded in the job description
    #[arg(long)]
    run_id: Option<String>,

    /// OpenAI-compatible endpoint serving the extraction model
    #[arg(long, env = "HADROPLAN_BASE_URL", default_value = config::DEFAULT_BASE_URL)]
    base_url: String,

    /// API key for the endpoint
    #[arg(long, env = "HADROPLAN_API_KEY", default_value = config::DEFAULT_API_KEY)]
    api_key: String,

    /// Model name served at the endpoint
    #[arg(long, env = "HADROPLAN_MODEL", default_value = config::DEFAULT_MODEL)]
    model: String,

    /// Extraction strategy for the stages
    #[arg(long, value_enum, default_value_t = StrategyChoice::Auto)]
    strategy: StrategyChoice,

    /// Persona brief file: answer all console questions and verdicts with
    /// an LLM stand-in instead of a person (unattended evaluation)
    #[arg(long)]
    evaluate: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let store = CheckpointStore::new(&cli.checkpoint);
    let mut state = match cli.resume {
        ResumeMode::Never => JobState::default(),
        ResumeMode::Always => store.load().with_context(|| {
            format!(
                "--resume always requires a checkpoint at {}",
                cli.checkpoint.display()
            )
        })?,
        ResumeMode::IfExists => {
            if store.exists() {
                store.load()?
            } else {
                JobState::default()
            }
        }
    };
    if !state.pending_stages().is_empty() && state != JobState::default() {
        tracing::info!(
            pending = state.pending_stages().len(),
            "Resuming a partially committed run"
        );
    }

    let llm = OpenAiChatClient::new(&cli.base_url, &cli.api_key, config::DEFAULT_TIMEOUT_SECS);

    let (mut prompter, mut approver): (Box<dyn Prompter>, Box<dyn Approver>) = match &cli.evaluate
    {
        Some(brief_path) => {
            let brief = fs::read_to_string(brief_path).with_context(|| {
                format!("Cannot read persona brief at {}", brief_path.display())
            })?;
            // The stand-in gets its own conversation and a sampling
            // temperature: it plays a person, not an extractor.
            let responder_llm =
                OpenAiChatClient::new(&cli.base_url, &cli.api_key, config::DEFAULT_TIMEOUT_SECS)
                    .with_temperature(0.7);
            let responder = ProxyResponder::new(Box::new(responder_llm), &cli.model, &brief);
            (
                Box::new(responder.clone()),
                Box::new(PrompterApprover::new(responder)),
            )
        }
        None => (
            Box::new(ConsolePrompter),
            Box::new(PrompterApprover::new(ConsolePrompter)),
        ),
    };

    let query = match cli.query {
        Some(query) => query,
        None if cli.evaluate.is_some() => {
            bail!("--evaluate needs the request on the command line")
        }
        None => ConsolePrompter.ask("What is your question?")?,
    };
    println!("{query}");

    let mut transcript = Transcript::from_request(&query);
    let mut orchestrator = Orchestrator::new(
        &llm,
        &cli.model,
        prompter.as_mut(),
        approver.as_mut(),
        &store,
        cli.strategy,
    );
    orchestrator.run(&mut state, &mut transcript)?;

    let run_id = cli
        .run_id
        .unwrap_or_else(|| format!("{}-{}", config::APP_NAME, uuid::Uuid::new_v4()));
    render::write_document(&state, &run_id, &cli.output)?;
    println!("Job description written to {}", cli.output.display());

    Ok(())
}
