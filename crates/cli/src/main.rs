//! # jobflow: job postings ETL
//!
//! Entry point for the `jobflow` command-line interface. Each subcommand runs
//! one stage of the pipeline; `run` chains all three.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jobflow::{fetch_to_store, load_pending, PipelineConfig, RunOutcome};
use std::future::Future;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a YAML config file (defaults to ./jobflow.yml if present)
    #[arg(long, global = true, env = "JOBFLOW_CONFIG")]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Fetch job postings from the search API into raw_data/
    Fetch,
    /// Clean, enrich and chunk the newest raw batch into processed_data/
    Process,
    /// Upsert every pending processed chunk into the database
    Load,
    /// Run fetch, process and load in order
    Run,
}

// --- Stages ---

async fn fetch(config: &PipelineConfig) -> Result<()> {
    let client = config.search_client()?;
    let store = config.object_store();
    let key = fetch_to_store(&client, &config.source.params, store.as_ref()).await?;
    info!(key = %key, "Fetch stage complete");
    Ok(())
}

async fn process(config: &PipelineConfig) -> Result<()> {
    let provider = config.ai_provider()?;
    let pipeline = config.pipeline(config.object_store(), provider);
    match pipeline.run().await? {
        RunOutcome::NothingToDo => Ok(()),
        RunOutcome::Completed(report) if report.is_success() => {
            info!(
                enriched = report.enrichment.enriched,
                fallbacks = report.enrichment.fallbacks,
                dropped = report.dropped_jobs,
                "Process stage complete"
            );
            Ok(())
        }
        RunOutcome::Completed(report) => {
            let failed: Vec<&str> = report
                .chunks
                .iter()
                .filter(|chunk| !chunk.is_persisted())
                .map(|chunk| chunk.key.as_str())
                .collect();
            bail!("Failed to persist chunks: {}", failed.join(", "))
        }
    }
}

async fn load(config: &PipelineConfig) -> Result<()> {
    let sink = config
        .job_sink()
        .await
        .with_context(|| format!("Failed to open database at '{}'", config.database.path))?;
    let store = config.object_store();
    let reports = load_pending(store.as_ref(), &sink).await?;
    let affected: u64 = reports.iter().map(|report| report.affected).sum();
    info!(files = reports.len(), affected, "Load stage complete");
    Ok(())
}

async fn run_command(command: Commands, config: &PipelineConfig) -> Result<()> {
    match command {
        Commands::Fetch => fetch(config).await,
        Commands::Process => process(config).await,
        Commands::Load => load(config).await,
        Commands::Run => {
            fetch(config).await.context("Fetch stage failed")?;
            process(config).await.context("Process stage failed")?;
            load(config).await.context("Load stage failed")
        }
    }
}

/// Drives `stage` until it finishes or Ctrl-C is pressed. On interrupt the
/// stage future is dropped, so nothing further is committed.
async fn until_interrupted(stage: impl Future<Output = Result<()>>) -> Result<()> {
    tokio::select! {
        result = stage => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; stopping without further commits");
            bail!("Interrupted")
        }
    }
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;

    if let Err(e) = until_interrupted(run_command(cli.command, &config)).await {
        error!("ETL pipeline failed: {e:#}");
        return Err(e);
    }
    Ok(())
}
