//! Error taxonomy for Runvault.
//!
//! Fatal errors (`Configuration`, `ProcessSpawn`) abort before any child
//! process work occurs. `StoreWrite` is recoverable per call: snapshot
//! passes log it and keep going, and the run outcome is never failed
//! solely because a persistence write was lost.

/// A single failed write to the artifact store.
///
/// Kept as its own type so store backends do not depend on the top-level
/// error enum.
#[derive(Debug, thiserror::Error)]
#[error("store write failed for key {key}: {reason}")]
pub struct StoreWriteError {
    /// The hierarchical key that could not be written.
    pub key: String,
    /// Backend-specific description of the failure.
    pub reason: String,
}

impl StoreWriteError {
    pub fn new(key: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Runvault errors.
#[derive(Debug, thiserror::Error)]
pub enum RunvaultError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to spawn {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    StoreWrite(#[from] StoreWriteError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Runvault operations.
pub type Result<T> = std::result::Result<T, RunvaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_write_error_display() {
        let err = StoreWriteError::new("experiments/e1/args", "503 service unavailable");
        let msg = err.to_string();
        assert!(msg.contains("experiments/e1/args"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_configuration_error_display() {
        let err = RunvaultError::Configuration("unsupported database type: redis".to_string());
        assert!(err.to_string().contains("unsupported database type"));
    }

    #[test]
    fn test_spawn_error_names_program() {
        let err = RunvaultError::ProcessSpawn {
            program: "/no/such/binary".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/no/such/binary"));
    }

    #[test]
    fn test_store_write_error_converts() {
        let err: RunvaultError = StoreWriteError::new("k", "boom").into();
        assert!(matches!(err, RunvaultError::StoreWrite(_)));
    }
}
