//! Runvault Core - Experiment Supervision & Snapshot Engine
//!
//! Launches a user-supplied program as a supervised child process, records
//! its invocation and captured output, and continuously snapshots the
//! working directory and generated model artifacts into a
//! content-addressed, deduplicated remote store, so a long-running
//! computation can be reconstructed or inspected after the fact.
//!
//! - A run gets a unique experiment id and a metadata record (invocation
//!   arguments plus environment manifest) before anything executes.
//! - A background scheduler snapshots the workspace and model directory
//!   at a fixed interval while the child runs.
//! - Whatever way the child terminates, a final drain takes one last
//!   snapshot of both directories before the run is reported finished.

pub mod artifact;
pub mod config;
pub mod error;
pub mod experiment;
pub mod manifest;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod supervisor;
pub mod telemetry;

// Re-export key types
pub use artifact::{decode_payload, encode_payload, Fingerprint, StoreWriter};
pub use config::{Config, DatabaseConfig, LogConfig};
pub use error::{Result, RunvaultError, StoreWriteError};
pub use experiment::{new_experiment_id, Experiment};
pub use scheduler::SnapshotScheduler;
pub use snapshot::snapshot_dir;
pub use store::firebase::FirebaseStore;
pub use store::memory::MemoryStore;
pub use store::{ArtifactStore, RetryPolicy};
pub use supervisor::{RunOutcome, Supervisor, MODEL_DIR_ENV};
pub use telemetry::init_tracing;
