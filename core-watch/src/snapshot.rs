//! # Snapshot Cache
//!
//! Disk persistence for the last good provider responses, so the UI can show
//! something meaningful while offline or while a provider is down.
//!
//! Snapshots are JSON envelopes written through tmp-file-plus-rename; a read
//! never fails the caller, a missing or corrupt snapshot is simply `None`.

use crate::error::Result;
use crate::types::WatchProvider;
use bridge_traits::{Clock, FileSystemAccess};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a snapshot file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    ContinueWatching,
    Library,
}

impl SnapshotKind {
    fn file_suffix(&self) -> &'static str {
        match self {
            SnapshotKind::ContinueWatching => "continue_watching",
            SnapshotKind::Library => "library",
        }
    }
}

/// Payload wrapper carrying the capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEnvelope<T> {
    pub updated_at_epoch_ms: i64,
    pub payload: T,
}

/// Per-provider snapshot files under a single directory.
pub struct SnapshotCache {
    fs: Arc<dyn FileSystemAccess>,
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl SnapshotCache {
    pub fn new(fs: Arc<dyn FileSystemAccess>, dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { fs, dir, clock }
    }

    fn path_for(&self, provider: WatchProvider, kind: SnapshotKind) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", provider.slug(), kind.file_suffix()))
    }

    /// Persist a snapshot, stamping it with the current time.
    pub async fn write<T: Serialize>(
        &self,
        provider: WatchProvider,
        kind: SnapshotKind,
        payload: &T,
    ) -> Result<()> {
        let envelope = SnapshotEnvelope {
            updated_at_epoch_ms: self.clock.unix_timestamp_millis(),
            payload,
        };
        let doc = Bytes::from(serde_json::to_vec(&envelope)?);

        self.fs.create_dir_all(&self.dir).await?;
        let path = self.path_for(provider, kind);
        let tmp = path.with_extension("json.tmp");

        self.fs.write_file(&tmp, doc.clone()).await?;
        if let Err(e) = self.fs.rename(&tmp, &path).await {
            warn!(path = ?path, error = %e, "Snapshot rename failed, writing in place");
            self.fs.write_file(&path, doc).await?;
            self.fs.delete_file(&tmp).await.ok();
        }

        debug!(provider = %provider, kind = ?kind, "Wrote snapshot");
        Ok(())
    }

    /// Load a snapshot. Missing, corrupt, or implausibly stamped files read
    /// as `None`.
    pub async fn read<T: DeserializeOwned>(
        &self,
        provider: WatchProvider,
        kind: SnapshotKind,
    ) -> Result<Option<SnapshotEnvelope<T>>> {
        let path = self.path_for(provider, kind);
        if !self.fs.exists(&path).await? {
            return Ok(None);
        }

        let raw = match self.fs.read_file(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = ?path, error = %e, "Snapshot read failed");
                return Ok(None);
            }
        };

        match serde_json::from_slice::<SnapshotEnvelope<T>>(&raw) {
            Ok(envelope) if envelope.updated_at_epoch_ms > 0 => Ok(Some(envelope)),
            Ok(_) => {
                warn!(path = ?path, "Discarding snapshot with invalid timestamp");
                Ok(None)
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Discarding corrupt snapshot");
                Ok(None)
            }
        }
    }

    /// Drop a snapshot if present.
    pub async fn invalidate(&self, provider: WatchProvider, kind: SnapshotKind) -> Result<()> {
        let path = self.path_for(provider, kind);
        if self.fs.exists(&path).await? {
            self.fs.delete_file(&path).await?;
            debug!(provider = %provider, kind = ?kind, "Invalidated snapshot");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use bridge_traits::SystemClock;
    use uuid::Uuid;

    fn cache_in_temp_dir() -> (SnapshotCache, PathBuf) {
        let dir = std::env::temp_dir().join(format!("snapshot-cache-{}", Uuid::new_v4()));
        let cache = SnapshotCache::new(
            Arc::new(TokioFileSystem),
            dir.clone(),
            Arc::new(SystemClock),
        );
        (cache, dir)
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let (cache, dir) = cache_in_temp_dir();

        let payload = vec!["tt1".to_string(), "tt2".to_string()];
        cache
            .write(WatchProvider::Trakt, SnapshotKind::ContinueWatching, &payload)
            .await
            .unwrap();

        let loaded: SnapshotEnvelope<Vec<String>> = cache
            .read(WatchProvider::Trakt, SnapshotKind::ContinueWatching)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.payload, payload);
        assert!(loaded.updated_at_epoch_ms > 0);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_providers_and_kinds_do_not_collide() {
        let (cache, dir) = cache_in_temp_dir();

        cache
            .write(WatchProvider::Trakt, SnapshotKind::ContinueWatching, &1u32)
            .await
            .unwrap();
        cache
            .write(WatchProvider::Simkl, SnapshotKind::ContinueWatching, &2u32)
            .await
            .unwrap();
        cache
            .write(WatchProvider::Trakt, SnapshotKind::Library, &3u32)
            .await
            .unwrap();

        let trakt_cw: SnapshotEnvelope<u32> = cache
            .read(WatchProvider::Trakt, SnapshotKind::ContinueWatching)
            .await
            .unwrap()
            .unwrap();
        let simkl_cw: SnapshotEnvelope<u32> = cache
            .read(WatchProvider::Simkl, SnapshotKind::ContinueWatching)
            .await
            .unwrap()
            .unwrap();
        let trakt_lib: SnapshotEnvelope<u32> = cache
            .read(WatchProvider::Trakt, SnapshotKind::Library)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trakt_cw.payload, 1);
        assert_eq!(simkl_cw.payload, 2);
        assert_eq!(trakt_lib.payload, 3);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_missing_snapshot_reads_none() {
        let (cache, _dir) = cache_in_temp_dir();

        let loaded: Option<SnapshotEnvelope<Vec<String>>> = cache
            .read(WatchProvider::Simkl, SnapshotKind::Library)
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reads_none() {
        let (cache, dir) = cache_in_temp_dir();

        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("trakt_library.json"), b"{nope")
            .await
            .unwrap();

        let loaded: Option<SnapshotEnvelope<Vec<String>>> = cache
            .read(WatchProvider::Trakt, SnapshotKind::Library)
            .await
            .unwrap();
        assert!(loaded.is_none());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_invalidate_removes_file() {
        let (cache, dir) = cache_in_temp_dir();

        cache
            .write(WatchProvider::Trakt, SnapshotKind::Library, &7u32)
            .await
            .unwrap();
        cache
            .invalidate(WatchProvider::Trakt, SnapshotKind::Library)
            .await
            .unwrap();

        let loaded: Option<SnapshotEnvelope<u32>> = cache
            .read(WatchProvider::Trakt, SnapshotKind::Library)
            .await
            .unwrap();
        assert!(loaded.is_none());

        // Idempotent.
        cache
            .invalidate(WatchProvider::Trakt, SnapshotKind::Library)
            .await
            .unwrap();

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
