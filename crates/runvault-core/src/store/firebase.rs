//! Firebase Realtime Database backend.
//!
//! Keys map onto the REST surface directly: `put("a/b/c", v)` becomes
//! `PUT {base_url}/a/b/c.json` with `v` as the JSON body, plus
//! `?auth={secret}` when a secret is configured. A `PUT` to the same path
//! with the same body is idempotent, which is exactly the per-fingerprint
//! write contract the snapshot engine relies on.

use async_trait::async_trait;
use serde_json::Value;

use super::ArtifactStore;
use crate::config::DatabaseConfig;
use crate::error::StoreWriteError;

/// reqwest-backed Firebase RTDB client.
pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    secret: Option<String>,
}

impl FirebaseStore {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            secret: config.secret.clone(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        let mut url = format!("{}/{}.json", self.base_url, key.trim_matches('/'));
        if let Some(secret) = &self.secret {
            url.push_str("?auth=");
            url.push_str(secret);
        }
        url
    }
}

#[async_trait]
impl ArtifactStore for FirebaseStore {
    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreWriteError> {
        let response = self
            .client
            .put(self.url_for(key))
            .json(value)
            .send()
            .await
            .map_err(|e| StoreWriteError::new(key, e))?;

        response
            .error_for_status()
            .map_err(|e| StoreWriteError::new(key, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str, secret: Option<&str>) -> FirebaseStore {
        FirebaseStore::new(&DatabaseConfig {
            backend: "firebase".to_string(),
            url: url.to_string(),
            secret: secret.map(str::to_string),
        })
    }

    #[test]
    fn test_url_shape() {
        let s = store("https://x.firebaseio.com", None);
        assert_eq!(
            s.url_for("experiments/e/args"),
            "https://x.firebaseio.com/experiments/e/args.json"
        );
    }

    #[test]
    fn test_url_trims_slashes_and_adds_auth() {
        let s = store("https://x.firebaseio.com/", Some("s3cret"));
        assert_eq!(
            s.url_for("/experiments/e/args/"),
            "https://x.firebaseio.com/experiments/e/args.json?auth=s3cret"
        );
    }
}
