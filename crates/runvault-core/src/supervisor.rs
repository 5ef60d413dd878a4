//! Process supervision for one experiment run.
//!
//! The supervisor records run metadata and a pre-run workspace baseline,
//! starts the periodic snapshot scheduler, spawns the target program with
//! combined stdout/stderr captured to a log file, and blocks on its
//! completion. Once the child terminates, for any reason, the drain phase
//! runs: stop the log-tail helper, take final snapshots of the model
//! directory and workspace, and shut the scheduler down. Drain is a
//! guaranteed-cleanup region: it executes even when the wait itself
//! errored or the host process was interrupted.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::artifact::StoreWriter;
use crate::config::Config;
use crate::error::{Result, RunvaultError};
use crate::experiment::{new_experiment_id, Experiment};
use crate::manifest::python_env_manifest;
use crate::scheduler::SnapshotScheduler;
use crate::snapshot::snapshot_dir;
use crate::store::{ArtifactStore, RetryPolicy};

/// Environment variable naming the per-experiment output directory,
/// exported to the supervised program.
pub const MODEL_DIR_ENV: &str = "RUNVAULT_MODEL_DIR";

/// What a completed run looked like.
#[derive(Debug)]
pub struct RunOutcome {
    pub experiment_id: String,
    /// The child's exit code. `None` when the run was interrupted or the
    /// child was terminated by a signal. Surfaced here for callers; the
    /// CLI deliberately does not turn it into its own exit code.
    pub exit_code: Option<i32>,
    /// Whether the host process was interrupted mid-run.
    pub interrupted: bool,
    /// Per-experiment output directory.
    pub model_dir: PathBuf,
    /// Combined stdout/stderr capture of the child.
    pub log_path: PathBuf,
}

enum WaitEnd {
    Exited(std::io::Result<std::process::ExitStatus>),
    Interrupted,
}

/// Supervises one experiment run end to end.
pub struct Supervisor {
    config: Config,
    writer: StoreWriter,
    workspace_dir: PathBuf,
    snapshot_interval: Duration,
}

impl Supervisor {
    pub fn new(config: Config, store: Arc<dyn ArtifactStore>) -> Self {
        let snapshot_interval = Duration::from_secs(config.save_workspace_frequency * 60);
        Self {
            writer: StoreWriter::new(store, RetryPolicy::default()),
            workspace_dir: PathBuf::from("."),
            snapshot_interval,
            config,
        }
    }

    /// Override the directory treated as the run's workspace (defaults to
    /// the current directory).
    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    /// Override the periodic snapshot interval derived from
    /// `saveWorkspaceFrequency`.
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Run `program args...` under supervision.
    ///
    /// `experiment_name` fixes the experiment id; by default a fresh
    /// unique id is generated. `save_workspace` controls whether the
    /// workspace is snapshotted at all (the model directory always is).
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        experiment_name: Option<String>,
        save_workspace: bool,
    ) -> Result<RunOutcome> {
        let id = experiment_name.unwrap_or_else(new_experiment_id);
        let experiment = Experiment::new(id, program, args);
        let key_base = experiment.key_base();
        info!(experiment = %experiment.id, program = %program, "starting supervised run");

        // -- Preparing ----------------------------------------------------
        self.record_metadata(&experiment, &key_base).await;

        let model_dir = self.config.experiments_dir.join(&experiment.id);
        std::fs::create_dir_all(&model_dir)?;
        let log_path = model_dir.join(&self.config.log.name);

        if save_workspace {
            self.snapshot(&self.workspace_dir, format!("{key_base}workspace/"))
                .await;
        }

        // -- Running ------------------------------------------------------
        let mut scheduler = SnapshotScheduler::new();
        scheduler.start();
        self.register_snapshot_jobs(&mut scheduler, &key_base, &model_dir, save_workspace);

        let log_file = std::fs::File::create(&log_path)?;
        let stderr_file = log_file.try_clone()?;

        let spawned = Command::new(program)
            .args(args)
            .current_dir(&self.workspace_dir)
            .env(MODEL_DIR_ENV, &model_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_file))
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                // Failed before Running: nothing may be left behind.
                scheduler.shutdown().await;
                return Err(RunvaultError::ProcessSpawn {
                    program: program.to_string(),
                    source,
                });
            }
        };

        let mut tail = match LogTail::start(&log_path) {
            Ok(tail) => Some(tail),
            Err(err) => {
                warn!(error = %err, "log tailing unavailable");
                None
            }
        };

        let end = tokio::select! {
            status = child.wait() => WaitEnd::Exited(status),
            _ = tokio::signal::ctrl_c() => WaitEnd::Interrupted,
        };
        if matches!(end, WaitEnd::Interrupted) {
            info!(experiment = %experiment.id, "interrupted, draining");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }

        // -- Draining -----------------------------------------------------
        // Everything here runs regardless of how the wait ended.
        if let Some(tail) = tail.take() {
            tail.stop().await;
        }
        self.snapshot(&model_dir, format!("{key_base}modeldir/")).await;
        if save_workspace {
            self.snapshot(&self.workspace_dir, format!("{key_base}workspace_latest/"))
                .await;
        }
        scheduler.shutdown().await;

        // -- Done ---------------------------------------------------------
        let (exit_code, interrupted) = match end {
            WaitEnd::Exited(status) => (status?.code(), false),
            WaitEnd::Interrupted => (None, true),
        };
        info!(
            experiment = %experiment.id,
            exit_code = ?exit_code,
            interrupted,
            "run finished"
        );

        Ok(RunOutcome {
            experiment_id: experiment.id,
            exit_code,
            interrupted,
            model_dir,
            log_path,
        })
    }

    /// Record invocation args and the environment manifest. Both are best
    /// effort: a lost metadata write never fails the run.
    async fn record_metadata(&self, experiment: &Experiment, key_base: &str) {
        let args = serde_json::Value::from(experiment.invocation_args.clone());
        if let Err(err) = self
            .writer
            .put_metadata(&format!("{key_base}args"), &args)
            .await
        {
            warn!(error = %err, "failed to record invocation args");
        }

        match python_env_manifest().await {
            Ok(packages) => {
                let value = serde_json::Value::from(packages);
                if let Err(err) = self
                    .writer
                    .put_metadata(&format!("{key_base}pythonenv"), &value)
                    .await
                {
                    warn!(error = %err, "failed to record environment manifest");
                }
            }
            Err(err) => warn!(error = %err, "environment manifest unavailable"),
        }
    }

    async fn snapshot(&self, root: &Path, key_prefix: String) {
        if let Err(err) = snapshot_dir(&self.writer, root, &key_prefix).await {
            warn!(key_prefix = %key_prefix, error = %err, "snapshot pass failed");
        }
    }

    fn register_snapshot_jobs(
        &self,
        scheduler: &mut SnapshotScheduler,
        key_base: &str,
        model_dir: &Path,
        save_workspace: bool,
    ) {
        let writer = self.writer.clone();
        let dir = model_dir.to_path_buf();
        let prefix = format!("{key_base}modeldir/");
        scheduler.add_job("modeldir-snapshot", self.snapshot_interval, move || {
            let writer = writer.clone();
            let dir = dir.clone();
            let prefix = prefix.clone();
            async move {
                snapshot_dir(&writer, &dir, &prefix)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
        });

        if save_workspace {
            let writer = self.writer.clone();
            let dir = self.workspace_dir.clone();
            let prefix = format!("{key_base}workspace_latest/");
            scheduler.add_job("workspace-snapshot", self.snapshot_interval, move || {
                let writer = writer.clone();
                let dir = dir.clone();
                let prefix = prefix.clone();
                async move {
                    snapshot_dir(&writer, &dir, &prefix)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            });
        }
    }
}

/// Best-effort `tail -f` of the run log onto the console.
///
/// Convenience only: a start failure is the caller's to log and ignore,
/// and [`LogTail::stop`] guarantees the helper does not outlive the
/// supervisor (`kill_on_drop` covers abnormal unwinds).
struct LogTail {
    child: Child,
}

impl LogTail {
    fn start(log_path: &Path) -> std::io::Result<Self> {
        let child = Command::new("tail")
            .arg("-f")
            .arg(log_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Self { child })
    }

    async fn stop(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}
