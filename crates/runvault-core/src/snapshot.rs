//! Directory snapshotting.
//!
//! A snapshot walks a directory tree and submits every regular file to the
//! [`StoreWriter`] under a caller-supplied key prefix. Traversal order is
//! unspecified. The walk races with the supervised program by design: a
//! file that vanishes between enumeration and read is skipped, not an
//! error.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::artifact::StoreWriter;
use crate::error::Result;

/// Snapshot every regular file under `root` into the store at `key_prefix`.
///
/// Symlinks and directories are not stored as entries. A store write
/// failure for one file is logged and does not stop the pass. Returns the
/// number of files successfully stored; an empty directory yields `Ok(0)`.
pub async fn snapshot_dir(writer: &StoreWriter, root: &Path, key_prefix: &str) -> Result<usize> {
    debug!(root = %root.display(), key_prefix = %key_prefix, "snapshotting directory");
    let mut stored = 0usize;

    for entry in WalkDir::new(root).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // Directory pruned mid-walk, or unreadable subtree.
                debug!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Benign race: the running program removed the file.
                debug!(path = %path.display(), "file vanished during snapshot");
                continue;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read file, skipping");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        match writer.store(key_prefix, &data, &name).await {
            Ok(_) => stored += 1,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "store write failed, skipping file");
            }
        }
    }

    debug!(root = %root.display(), stored, "snapshot pass complete");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{decode_payload, Fingerprint};
    use crate::store::memory::MemoryStore;
    use crate::store::RetryPolicy;
    use std::sync::Arc;

    fn writer(store: &Arc<MemoryStore>) -> StoreWriter {
        StoreWriter::new(
            store.clone() as Arc<dyn crate::store::ArtifactStore>,
            RetryPolicy {
                max_attempts: 1,
                backoff_base_ms: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_empty_directory_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let stored = snapshot_dir(&writer(&store), dir.path(), "p/").await.unwrap();
        assert_eq!(stored, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_nested_files_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.txt"), b"top").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("deep.txt"), b"deep").unwrap();

        let store = Arc::new(MemoryStore::new());
        let stored = snapshot_dir(&writer(&store), dir.path(), "p/").await.unwrap();
        assert_eq!(stored, 2);

        let fp = Fingerprint::compute(b"deep");
        let value = store.get(&format!("p/{fp}/data")).unwrap();
        assert_eq!(decode_payload(value.as_str().unwrap()).unwrap(), b"deep");
        assert_eq!(
            store.get(&format!("p/{fp}/name")),
            Some(serde_json::Value::from("deep.txt"))
        );
    }

    #[tokio::test]
    async fn test_identical_files_collapse_to_one_blob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"same").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"same").unwrap();

        let store = Arc::new(MemoryStore::new());
        let stored = snapshot_dir(&writer(&store), dir.path(), "p/").await.unwrap();
        assert_eq!(stored, 2);

        let fp = Fingerprint::compute(b"same");
        // Both submissions land on the same data/name pair.
        assert_eq!(
            store.keys_under("p/"),
            vec![format!("p/{fp}/data"), format!("p/{fp}/name")]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.txt"), b"real").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        let stored = snapshot_dir(&writer(&store), dir.path(), "p/").await.unwrap();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn test_missing_root_yields_no_entries() {
        let store = Arc::new(MemoryStore::new());
        let stored = snapshot_dir(
            &writer(&store),
            Path::new("/no/such/snapshot/root"),
            "p/",
        )
        .await
        .unwrap();
        assert_eq!(stored, 0);
    }
}
