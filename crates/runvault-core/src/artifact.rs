//! Content-addressed artifact writer.
//!
//! Every file is filed under the SHA-256 fingerprint of its raw bytes, so
//! identical content under the same key prefix collapses to one stored
//! blob no matter how many paths it appears at. The payload is
//! zlib-compressed and base64-encoded before writing, since the remote
//! store only accepts text-safe values.
//!
//! Layout per blob: `{prefix}{fingerprint}/data` holds the encoded payload
//! and `{prefix}{fingerprint}/name` the original file name. The `name`
//! write is only attempted after the `data` write succeeded, so a partial
//! entry is always missing its name rather than its content.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest as Sha2Digest, Sha256};
use tracing::debug;

use crate::error::StoreWriteError;
use crate::store::{put_with_retry, ArtifactStore, RetryPolicy};

/// SHA-256 content fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Hex-encoded string, as used in store keys.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fingerprint({})",
            self.to_hex().chars().take(12).collect::<String>()
        )
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| format!("invalid fingerprint hex: {s}"))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| format!("fingerprint must be 32 bytes: {s}"))?;
        Ok(Self(arr))
    }
}

/// Encode raw bytes into their stored text-safe form.
pub fn encode_payload(data: &[u8]) -> String {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("writing to Vec cannot fail");
    let compressed = encoder.finish().expect("writing to Vec cannot fail");
    BASE64_STANDARD.encode(compressed)
}

/// Inverse of [`encode_payload`].
pub fn decode_payload(payload: &str) -> std::io::Result<Vec<u8>> {
    let compressed = BASE64_STANDARD
        .decode(payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut data = Vec::new();
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut data)?;
    Ok(data)
}

/// Writes fingerprinted blobs into an [`ArtifactStore`].
#[derive(Clone)]
pub struct StoreWriter {
    store: Arc<dyn ArtifactStore>,
    retry: RetryPolicy,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn ArtifactStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Store one blob under `prefix`, keyed by its content fingerprint.
    ///
    /// Returns the fingerprint the blob was filed under. If the `data`
    /// write fails after retries, the error propagates and the `name` key
    /// is left unwritten.
    pub async fn store(
        &self,
        prefix: &str,
        data: &[u8],
        original_name: &str,
    ) -> Result<Fingerprint, StoreWriteError> {
        let fingerprint = Fingerprint::compute(data);
        debug!(prefix = %prefix, name = %original_name, fingerprint = %fingerprint, "storing artifact");

        let data_key = format!("{prefix}{fingerprint}/data");
        let payload = serde_json::Value::from(encode_payload(data));
        put_with_retry(self.store.as_ref(), &self.retry, &data_key, &payload).await?;

        let name_key = format!("{prefix}{fingerprint}/name");
        let name = serde_json::Value::from(original_name);
        put_with_retry(self.store.as_ref(), &self.retry, &name_key, &name).await?;

        Ok(fingerprint)
    }

    /// Store a metadata value under an explicit key (no fingerprinting).
    pub async fn put_metadata(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreWriteError> {
        put_with_retry(self.store.as_ref(), &self.retry, key, value).await
    }
}
