//! Runvault - supervised experiment runs
//!
//! `runvault [--config <path>] <program> [args...]` launches the given
//! program under supervision: its invocation and combined output are
//! recorded, and the workspace and model directory are continuously
//! snapshotted into the configured store.
//!
//! The process exit code reflects only supervisor-level failures. The
//! child program's own exit code is reported in the logs and available to
//! library callers, but deliberately not propagated here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use runvault_core::{init_tracing, ArtifactStore, Config, FirebaseStore, Supervisor};

#[derive(Parser)]
#[command(name = "runvault")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a program under supervision with continuous snapshots", long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fix the experiment id instead of generating one
    #[arg(long)]
    experiment: Option<String>,

    /// Skip workspace snapshots (the model directory is still captured)
    #[arg(long)]
    no_workspace: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Program to run, followed by its arguments
    #[arg(trailing_var_arg = true, required = true)]
    script_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let store: Arc<dyn ArtifactStore> = Arc::new(FirebaseStore::new(&config.database));

    let (program, args) = cli
        .script_args
        .split_first()
        .expect("clap enforces at least one script arg");

    let supervisor = Supervisor::new(config, store);
    let outcome = supervisor
        .run(program, args, cli.experiment, !cli.no_workspace)
        .await
        .context("supervised run failed")?;

    info!(
        experiment = %outcome.experiment_id,
        exit_code = ?outcome.exit_code,
        log = %outcome.log_path.display(),
        "experiment complete"
    );
    Ok(())
}
