//! The artifact store capability.
//!
//! The remote store is opaque to this crate: hierarchical `/`-delimited
//! keys, JSON-compatible values, at-least-once durability per key, no
//! multi-key transactions. Everything above it (fingerprinting,
//! deduplication, snapshot layout) is built on [`ArtifactStore::put`]
//! alone.
//!
//! Writes under the same key with the same value must be idempotent; that
//! is a contract the backend honors, not something this crate enforces.

pub mod firebase;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::StoreWriteError;

/// Key/value persistence consumed by the snapshot engine.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `value` under `key`. Keys are hierarchical, `/`-delimited.
    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreWriteError>;
}

/// Bounded retry with exponential backoff for a single store write.
///
/// The original behavior on a transiently unavailable store was
/// unspecified; each write now gets `max_attempts` tries with
/// `backoff_base_ms * 2^(attempt-1)` between them before the
/// [`StoreWriteError`] is surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per write (1 = no retries).
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 250,
        }
    }
}

/// Write `value` under `key`, retrying per `policy`.
///
/// Returns the last error once all attempts are exhausted.
pub async fn put_with_retry(
    store: &dyn ArtifactStore,
    policy: &RetryPolicy,
    key: &str,
    value: &Value,
) -> Result<(), StoreWriteError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        match store.put(key, value).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                if attempt < max_attempts {
                    let delay =
                        Duration::from_millis(policy.backoff_base_ms * 2u64.pow(attempt - 1));
                    warn!(key = %key, attempt, error = %err, "store write failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| StoreWriteError::new(key, "no write attempt was made")))
}
