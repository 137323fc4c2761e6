//! On-disk artifact layout.
//!
//! Each stream lives in `<base>/<key>/`. The encoder owns everything inside
//! the directory once it is running; the store only creates, checks, lists
//! and deletes whole directories.

use std::path::{Path, PathBuf};

use stillcast_av::MANIFEST_NAME;
use stillcast_common::{Result, StreamKey};

/// Root of the per-stream artifact directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn dir(&self, key: &StreamKey) -> PathBuf {
        self.base.join(key.as_str())
    }

    pub fn manifest_path(&self, key: &StreamKey) -> PathBuf {
        self.dir(key).join(MANIFEST_NAME)
    }

    /// A stream is ready once its playlist exists and is non-empty.
    pub async fn is_ready(&self, key: &StreamKey) -> bool {
        tokio::fs::metadata(self.manifest_path(key))
            .await
            .map(|m| is_playlist(&m))
            .unwrap_or(false)
    }

    /// Create the stream directory (and the base, if needed).
    pub async fn prepare(&self, key: &StreamKey) -> Result<PathBuf> {
        let dir = self.dir(key);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove a stream directory. A missing directory is not an error; any
    /// other failure is logged and swallowed.
    pub async fn delete(&self, key: &StreamKey) {
        let dir = self.dir(key);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!(key = %key, "Removed stream directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to remove stream directory"),
        }
    }

    /// Keys of every ready stream under the base directory.
    ///
    /// Directories whose names are not stream keys are skipped.
    pub fn list(&self) -> Result<Vec<StreamKey>> {
        let entries = match std::fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys: Vec<StreamKey> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str()?.parse::<StreamKey>().ok())
            .filter(|key| {
                std::fs::metadata(self.manifest_path(key))
                    .map(|m| is_playlist(&m))
                    .unwrap_or(false)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn is_playlist(meta: &std::fs::Metadata) -> bool {
    meta.is_file() && meta.len() > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readiness_requires_non_empty_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let key = StreamKey::digest("https://example.com/a.jpg");

        assert!(!store.is_ready(&key).await);

        let dir = store.prepare(&key).await.unwrap();
        assert_eq!(dir, tmp.path().join(key.as_str()));
        assert!(!store.is_ready(&key).await);

        std::fs::write(store.manifest_path(&key), "").unwrap();
        assert!(!store.is_ready(&key).await);

        std::fs::write(store.manifest_path(&key), "#EXTM3U\n").unwrap();
        assert!(store.is_ready(&key).await);
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let key = StreamKey::digest("x");

        store.delete(&key).await;

        store.prepare(&key).await.unwrap();
        std::fs::write(store.dir(&key).join("seg_00000.ts"), b"ts").unwrap();
        store.delete(&key).await;
        assert!(!store.dir(&key).exists());
    }

    #[tokio::test]
    async fn test_list_only_ready_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let ready = StreamKey::digest("ready");
        let pending = StreamKey::digest("pending");

        store.prepare(&ready).await.unwrap();
        std::fs::write(store.manifest_path(&ready), "#EXTM3U\n").unwrap();
        store.prepare(&pending).await.unwrap();
        std::fs::create_dir_all(tmp.path().join("not-a-key")).unwrap();

        assert_eq!(store.list().unwrap(), vec![ready]);
    }

    #[test]
    fn test_list_missing_base() {
        let store = ArtifactStore::new("/nonexistent/stillcast/base");
        assert!(store.list().unwrap().is_empty());
    }
}
