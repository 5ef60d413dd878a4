//! Experiment identity.

use chrono::{DateTime, Utc};

/// Generate a unique experiment id.
///
/// A random 128-bit identifier; unique with overwhelming probability
/// across the lifetime of the store, with no external coordination.
pub fn new_experiment_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One supervised run, created at the start of `run()` and immutable
/// thereafter. Persists in the store indefinitely.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub id: String,
    /// Program path followed by its arguments, in order.
    pub invocation_args: Vec<String>,
    pub start_time: DateTime<Utc>,
}

impl Experiment {
    pub fn new(id: String, program: &str, args: &[String]) -> Self {
        let mut invocation_args = Vec::with_capacity(args.len() + 1);
        invocation_args.push(program.to_string());
        invocation_args.extend_from_slice(args);
        Self {
            id,
            invocation_args,
            start_time: Utc::now(),
        }
    }

    /// Store key prefix for everything this experiment persists.
    pub fn key_base(&self) -> String {
        format!("experiments/{}/", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = new_experiment_id();
        let b = new_experiment_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_invocation_args_start_with_program() {
        let exp = Experiment::new(
            "e1".to_string(),
            "train.py",
            &["--epochs".to_string(), "10".to_string()],
        );
        assert_eq!(exp.invocation_args, vec!["train.py", "--epochs", "10"]);
        assert_eq!(exp.key_base(), "experiments/e1/");
    }
}
