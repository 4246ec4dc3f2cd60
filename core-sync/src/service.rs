//! # Watch History Service
//!
//! The facade the UI talks to: continue-watching lists, provider libraries,
//! ratings and watchlist membership, all per selected source.
//!
//! ## Fallback Chain
//!
//! A provider-sourced continue-watching request degrades in steps rather
//! than failing:
//!
//! 1. live provider response (snapshotted on success)
//! 2. on provider error, the last snapshot with an "unavailable" status
//! 3. locally derived entries
//!
//! Every response carries a status text; an empty status means the entries
//! are live and current.

use crate::adapter::{LibraryFolder, ProviderAdapter};
use crate::error::{Result, SyncError};
use bridge_traits::Clock;
use core_watch::planner::plan_continue_watching;
use core_watch::snapshot::{SnapshotCache, SnapshotKind};
use core_watch::store::ProgressStore;
use core_watch::types::{ContinueWatchingCandidate, MediaType, WatchProvider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Episodes at or above this percent count as watched when deriving local
/// continue-watching entries.
const EPISODE_COMPLETION_PERCENT: f64 = 85.0;

const DEFAULT_MAX_ITEMS: usize = 20;

/// A continue-watching response: ranked entries plus a user-facing status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueWatchingList {
    pub entries: Vec<ContinueWatchingCandidate>,
    /// Empty when the entries are live and current.
    pub status: String,
}

/// A provider library response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryList {
    pub folders: Vec<LibraryFolder>,
    pub status: String,
}

pub struct WatchHistoryService {
    adapters: BTreeMap<WatchProvider, Arc<dyn ProviderAdapter>>,
    store: Arc<ProgressStore>,
    snapshots: Arc<SnapshotCache>,
    clock: Arc<dyn Clock>,
    max_items: usize,
}

impl WatchHistoryService {
    pub fn new(store: Arc<ProgressStore>, snapshots: Arc<SnapshotCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            adapters: BTreeMap::new(),
            store,
            snapshots,
            clock,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn register_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// The continue-watching list for the selected source. `limit` caps the
    /// entry count for this call; `None` uses the configured default.
    pub async fn continue_watching(
        &self,
        source: WatchProvider,
        limit: Option<usize>,
    ) -> Result<ContinueWatchingList> {
        let limit = limit.unwrap_or(self.max_items);

        if source == WatchProvider::Local {
            let entries = self.local_plan(limit).await?;
            let status = if entries.is_empty() {
                "No local continue watching entries yet.".to_string()
            } else {
                String::new()
            };
            return Ok(ContinueWatchingList { entries, status });
        }

        let name = source.display_name();

        let Some(adapter) = self.adapters.get(&source) else {
            return self
                .local_fallback(limit, format!("{name} not connected."))
                .await;
        };
        if !adapter.has_client_id() {
            return self
                .local_fallback(limit, format!("{name} not connected."))
                .await;
        }
        if !adapter.has_access_token() {
            return self
                .local_fallback(limit, format!("Connect {name} to load continue watching."))
                .await;
        }

        let now_ms = self.clock.unix_timestamp_millis();
        let live = match adapter.list_continue_watching(now_ms).await {
            Ok(live) => live,
            Err(e) => {
                warn!(provider = %source, error = %e, "Live continue watching failed");
                return self.degraded_continue_watching(source, limit).await;
            }
        };

        let entries = plan_continue_watching(live, now_ms, limit);
        if entries.is_empty() {
            let fallback = self.local_plan(limit).await?;
            if !fallback.is_empty() {
                debug!(provider = %source, "Provider list empty, serving local entries");
                return Ok(ContinueWatchingList {
                    entries: fallback,
                    status: String::new(),
                });
            }
            return Ok(ContinueWatchingList {
                entries: Vec::new(),
                status: format!("No {name} continue watching entries available."),
            });
        }

        let list = ContinueWatchingList {
            entries,
            status: String::new(),
        };
        if let Err(e) = self
            .snapshots
            .write(source, SnapshotKind::ContinueWatching, &list)
            .await
        {
            warn!(provider = %source, error = %e, "Snapshot write failed");
        }
        Ok(list)
    }

    /// Serve the last snapshot, or locally derived entries when there is
    /// none.
    async fn degraded_continue_watching(
        &self,
        source: WatchProvider,
        limit: usize,
    ) -> Result<ContinueWatchingList> {
        let name = source.display_name();

        if let Some(cached) = self
            .snapshots
            .read::<ContinueWatchingList>(source, SnapshotKind::ContinueWatching)
            .await?
        {
            let status = format!("{name} temporarily unavailable. {}", cached.payload.status)
                .trim_end()
                .to_string();
            let mut entries = cached.payload.entries;
            entries.truncate(limit);
            return Ok(ContinueWatchingList { entries, status });
        }

        let entries = self.local_plan(limit).await?;
        let status = if entries.is_empty() {
            format!("{name} temporarily unavailable. No continue watching entries yet.")
        } else {
            format!("{name} temporarily unavailable.")
        };
        Ok(ContinueWatchingList { entries, status })
    }

    async fn local_fallback(&self, limit: usize, status: String) -> Result<ContinueWatchingList> {
        Ok(ContinueWatchingList {
            entries: self.local_plan(limit).await?,
            status,
        })
    }

    async fn local_plan(&self, limit: usize) -> Result<Vec<ContinueWatchingCandidate>> {
        let candidates = self.local_candidates().await?;
        Ok(plan_continue_watching(
            candidates,
            self.clock.unix_timestamp_millis(),
            limit,
        ))
    }

    /// Derive continue-watching candidates from the local progress store.
    ///
    /// Movies and base series records map directly. Episode records collapse
    /// to the most recently updated unfinished episode per show; finished
    /// episodes are watch history, not continue-watching material.
    async fn local_candidates(&self) -> Result<Vec<ContinueWatchingCandidate>> {
        let removed = self.store.removed_markers().await?;
        let mut candidates = Vec::new();
        let mut best_episode: BTreeMap<String, ContinueWatchingCandidate> = BTreeMap::new();

        for (key, record) in self.store.all_progress().await? {
            if record.last_updated_epoch_ms <= 0 {
                continue;
            }
            if let Some(&removed_at) = removed.get(&key.base().encode()) {
                if record.last_updated_epoch_ms <= removed_at {
                    continue;
                }
            }

            let candidate = ContinueWatchingCandidate {
                media_type: key.media_type,
                content_id: key.content_id.clone(),
                episode_key: key.episode.clone(),
                progress_percent: record.progress_percent(),
                last_updated_ms: record.last_updated_epoch_ms,
                is_up_next_placeholder: false,
                provider: WatchProvider::Local,
            };

            if key.is_episode() {
                if candidate.progress_percent >= EPISODE_COMPLETION_PERCENT {
                    continue;
                }
                match best_episode.get(&key.content_id) {
                    Some(existing) if existing.last_updated_ms >= candidate.last_updated_ms => {}
                    _ => {
                        best_episode.insert(key.content_id.clone(), candidate);
                    }
                }
            } else {
                candidates.push(candidate);
            }
        }

        candidates.extend(best_episode.into_values());
        Ok(candidates)
    }

    /// The provider library for the selected source. Folders come back
    /// sorted by label with items newest first, each folder truncated to
    /// `limit_per_folder`.
    pub async fn library(
        &self,
        source: WatchProvider,
        limit_per_folder: usize,
    ) -> Result<LibraryList> {
        if source == WatchProvider::Local {
            return Ok(LibraryList {
                folders: Vec::new(),
                status: "Local source selected. Provider library unavailable.".to_string(),
            });
        }

        let name = source.display_name();
        let Some(adapter) = self.adapters.get(&source) else {
            return Ok(LibraryList {
                folders: Vec::new(),
                status: format!("{name} not connected."),
            });
        };
        if !adapter.has_client_id() || !adapter.has_access_token() {
            return Ok(LibraryList {
                folders: Vec::new(),
                status: format!("{name} not connected."),
            });
        }

        let folders = match adapter.list_library().await {
            Ok(folders) => folders,
            Err(e) => {
                warn!(provider = %source, error = %e, "Live library listing failed");
                let cached = self
                    .snapshots
                    .read::<Vec<LibraryFolder>>(source, SnapshotKind::Library)
                    .await?;
                return Ok(LibraryList {
                    folders: arrange_library(
                        cached.map(|env| env.payload).unwrap_or_default(),
                        limit_per_folder,
                    ),
                    status: format!("{name} temporarily unavailable."),
                });
            }
        };

        if let Err(e) = self
            .snapshots
            .write(source, SnapshotKind::Library, &folders)
            .await
        {
            warn!(provider = %source, error = %e, "Snapshot write failed");
        }
        Ok(LibraryList {
            folders: arrange_library(folders, limit_per_folder),
            status: String::new(),
        })
    }

    /// Mark or unmark a title as watched in the provider history. Returns
    /// the user-facing status text. Success invalidates the provider's
    /// continue-watching snapshot.
    pub async fn set_watched(
        &self,
        source: WatchProvider,
        media_type: MediaType,
        content_id: &str,
        watched: bool,
    ) -> Result<String> {
        if source == WatchProvider::Local {
            return Ok("Watched status is unavailable for local watch history.".to_string());
        }
        let adapter = self.usable_adapter(source)?;
        adapter.set_watched(media_type, content_id, watched).await?;
        self.snapshots
            .invalidate(source, SnapshotKind::ContinueWatching)
            .await?;
        Ok(if watched {
            "Marked as watched.".to_string()
        } else {
            "Marked as unwatched.".to_string()
        })
    }

    /// Rate a title at the provider. Returns the user-facing status text.
    pub async fn set_rating(
        &self,
        source: WatchProvider,
        media_type: MediaType,
        content_id: &str,
        rating: Option<u8>,
    ) -> Result<String> {
        if source == WatchProvider::Local {
            return Ok("Rating is unavailable for local watch history.".to_string());
        }
        let adapter = self.usable_adapter(source)?;
        adapter.set_rating(media_type, content_id, rating).await?;
        self.snapshots.invalidate(source, SnapshotKind::Library).await?;
        Ok(match rating {
            Some(_) => "Rating saved.".to_string(),
            None => "Rating removed.".to_string(),
        })
    }

    /// Add or remove a title from the provider watchlist. Returns the
    /// user-facing status text.
    pub async fn set_in_watchlist(
        &self,
        source: WatchProvider,
        media_type: MediaType,
        content_id: &str,
        in_watchlist: bool,
    ) -> Result<String> {
        if source == WatchProvider::Local {
            return Ok("Watchlist is unavailable for local watch history.".to_string());
        }
        let adapter = self.usable_adapter(source)?;
        adapter
            .set_in_watchlist(media_type, content_id, in_watchlist)
            .await?;
        self.snapshots.invalidate(source, SnapshotKind::Library).await?;
        Ok(if in_watchlist {
            "Saved to watchlist.".to_string()
        } else {
            "Removed from watchlist.".to_string()
        })
    }

    /// Remove a title from continue-watching everywhere it could reappear
    /// from: all its progress records, plus a base tombstone and a removal
    /// marker so stale provider reports cannot resurrect it.
    pub async fn remove_from_continue_watching(
        &self,
        media_type: MediaType,
        content_id: &str,
    ) -> Result<String> {
        self.store
            .remove_all_for_content(media_type, content_id, true)
            .await?;
        self.store.set_removed_marker(media_type, content_id).await?;

        for provider in self.adapters.keys() {
            self.snapshots
                .invalidate(*provider, SnapshotKind::ContinueWatching)
                .await?;
        }

        Ok("Removed from continue watching.".to_string())
    }

    fn usable_adapter(&self, source: WatchProvider) -> Result<&Arc<dyn ProviderAdapter>> {
        let adapter = self
            .adapters
            .get(&source)
            .ok_or_else(|| SyncError::ProviderUnavailable {
                provider: source.display_name().to_string(),
            })?;
        if !adapter.has_client_id() || !adapter.has_access_token() {
            return Err(SyncError::ProviderUnavailable {
                provider: source.display_name().to_string(),
            });
        }
        Ok(adapter)
    }
}

fn arrange_library(mut folders: Vec<LibraryFolder>, limit_per_folder: usize) -> Vec<LibraryFolder> {
    folders.sort_by(|a, b| a.label.cmp(&b.label));
    for folder in &mut folders {
        folder
            .items
            .sort_by(|a, b| b.added_at_epoch_ms.cmp(&a.added_at_epoch_ms));
        folder.items.truncate(limit_per_folder);
    }
    folders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockProviderAdapter;
    use bridge_desktop::{FileKeyValueStore, TokioFileSystem};
    use chrono::{DateTime, TimeZone, Utc};
    use core_runtime::events::EventBus;
    use core_watch::store::WriteOptions;
    use core_watch::types::{ProgressKey, ProgressRecord};
    use std::path::PathBuf;
    use uuid::Uuid;

    const NOW: i64 = 1_700_000_000_000;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.0).unwrap()
        }
    }

    fn service() -> (WatchHistoryService, Arc<ProgressStore>, PathBuf) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(NOW));
        let store = Arc::new(ProgressStore::new(
            Arc::new(FileKeyValueStore::in_memory()),
            Arc::clone(&clock),
            EventBus::new(16),
        ));
        let dir = std::env::temp_dir().join(format!("watch-service-{}", Uuid::new_v4()));
        let snapshots = Arc::new(SnapshotCache::new(
            Arc::new(TokioFileSystem),
            dir.clone(),
            Arc::clone(&clock),
        ));
        (
            WatchHistoryService::new(Arc::clone(&store), snapshots, clock),
            store,
            dir,
        )
    }

    async fn seed_movie(store: &ProgressStore, id: &str, percent: f64, updated: i64) {
        let duration = 1_000.0;
        store
            .set_progress(
                &ProgressKey::new(MediaType::Movie, id),
                ProgressRecord::new(percent * 10.0, duration, updated),
                WriteOptions {
                    preserve_timestamp: true,
                    force_write: true,
                    force_notify: false,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_local_source_empty_status() {
        let (svc, _store, _dir) = service();
        let list = svc.continue_watching(WatchProvider::Local, None).await.unwrap();
        assert!(list.entries.is_empty());
        assert_eq!(list.status, "No local continue watching entries yet.");
    }

    #[tokio::test]
    async fn test_local_source_lists_entries() {
        let (svc, store, _dir) = service();
        seed_movie(&store, "tt1", 40.0, NOW - 1_000).await;

        let list = svc.continue_watching(WatchProvider::Local, None).await.unwrap();
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.status, "");
    }

    #[tokio::test]
    async fn test_unregistered_provider_falls_back_to_local() {
        let (svc, store, _dir) = service();
        seed_movie(&store, "tt1", 40.0, NOW - 1_000).await;

        let list = svc.continue_watching(WatchProvider::Trakt, None).await.unwrap();
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.status, "Trakt not connected.");
    }

    #[tokio::test]
    async fn test_missing_token_status() {
        let (mut svc, _store, _dir) = service();
        let mut adapter = MockProviderAdapter::new();
        adapter.expect_provider().return_const(WatchProvider::Trakt);
        adapter.expect_has_client_id().return_const(true);
        adapter.expect_has_access_token().return_const(false);
        svc.register_adapter(Arc::new(adapter));

        let list = svc.continue_watching(WatchProvider::Trakt, None).await.unwrap();
        assert_eq!(list.status, "Connect Trakt to load continue watching.");
    }

    #[tokio::test]
    async fn test_live_list_served_and_snapshotted() {
        let (mut svc, _store, dir) = service();
        let mut adapter = MockProviderAdapter::new();
        adapter.expect_provider().return_const(WatchProvider::Trakt);
        adapter.expect_has_client_id().return_const(true);
        adapter.expect_has_access_token().return_const(true);
        adapter.expect_list_continue_watching().returning(|_| {
            Ok(vec![ContinueWatchingCandidate {
                media_type: MediaType::Movie,
                content_id: "tt9".to_string(),
                episode_key: None,
                progress_percent: 40.0,
                last_updated_ms: NOW - 1_000,
                is_up_next_placeholder: false,
                provider: WatchProvider::Trakt,
            }])
        });
        svc.register_adapter(Arc::new(adapter));

        let list = svc.continue_watching(WatchProvider::Trakt, None).await.unwrap();
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.status, "");
        assert!(dir.join("trakt_continue_watching.json").exists());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_provider_error_serves_snapshot_with_prefix() {
        let (mut svc, _store, dir) = service();

        let mut good = MockProviderAdapter::new();
        good.expect_provider().return_const(WatchProvider::Trakt);
        good.expect_has_client_id().return_const(true);
        good.expect_has_access_token().return_const(true);
        good.expect_list_continue_watching().returning(|_| {
            Ok(vec![ContinueWatchingCandidate {
                media_type: MediaType::Movie,
                content_id: "tt9".to_string(),
                episode_key: None,
                progress_percent: 40.0,
                last_updated_ms: NOW - 1_000,
                is_up_next_placeholder: false,
                provider: WatchProvider::Trakt,
            }])
        });
        svc.register_adapter(Arc::new(good));
        svc.continue_watching(WatchProvider::Trakt, None).await.unwrap();

        let mut broken = MockProviderAdapter::new();
        broken.expect_provider().return_const(WatchProvider::Trakt);
        broken.expect_has_client_id().return_const(true);
        broken.expect_has_access_token().return_const(true);
        broken
            .expect_list_continue_watching()
            .returning(|_| Err(SyncError::Provider("http 503".to_string())));
        svc.register_adapter(Arc::new(broken));

        let list = svc.continue_watching(WatchProvider::Trakt, None).await.unwrap();
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.status, "Trakt temporarily unavailable.");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_empty_live_list_falls_back_to_local() {
        let (mut svc, store, _dir) = service();
        seed_movie(&store, "tt1", 40.0, NOW - 1_000).await;

        let mut adapter = MockProviderAdapter::new();
        adapter.expect_provider().return_const(WatchProvider::Simkl);
        adapter.expect_has_client_id().return_const(true);
        adapter.expect_has_access_token().return_const(true);
        adapter
            .expect_list_continue_watching()
            .returning(|_| Ok(Vec::new()));
        svc.register_adapter(Arc::new(adapter));

        let list = svc.continue_watching(WatchProvider::Simkl, None).await.unwrap();
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.status, "");
        assert_eq!(list.entries[0].provider, WatchProvider::Local);
    }

    #[tokio::test]
    async fn test_empty_everywhere_status() {
        let (mut svc, _store, _dir) = service();
        let mut adapter = MockProviderAdapter::new();
        adapter.expect_provider().return_const(WatchProvider::Trakt);
        adapter.expect_has_client_id().return_const(true);
        adapter.expect_has_access_token().return_const(true);
        adapter
            .expect_list_continue_watching()
            .returning(|_| Ok(Vec::new()));
        svc.register_adapter(Arc::new(adapter));

        let list = svc.continue_watching(WatchProvider::Trakt, None).await.unwrap();
        assert!(list.entries.is_empty());
        assert_eq!(list.status, "No Trakt continue watching entries available.");
    }

    #[tokio::test]
    async fn test_local_derivation_keeps_latest_episode_per_show() {
        let (svc, store, _dir) = service();
        let opts = WriteOptions {
            preserve_timestamp: true,
            force_write: true,
            force_notify: false,
        };

        store
            .set_progress(
                &ProgressKey::new(MediaType::Series, "tt1").with_episode("1:1"),
                ProgressRecord::new(900.0, 1_000.0, NOW - 3_000),
                opts,
            )
            .await
            .unwrap();
        store
            .set_progress(
                &ProgressKey::new(MediaType::Series, "tt1").with_episode("1:2"),
                ProgressRecord::new(400.0, 1_000.0, NOW - 2_000),
                opts,
            )
            .await
            .unwrap();
        store
            .set_progress(
                &ProgressKey::new(MediaType::Series, "tt1").with_episode("1:3"),
                ProgressRecord::new(100.0, 1_000.0, NOW - 5_000),
                opts,
            )
            .await
            .unwrap();

        let list = svc.continue_watching(WatchProvider::Local, None).await.unwrap();
        // Episode 1:1 is finished, 1:2 is the most recent unfinished one.
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.entries[0].episode_key.as_deref(), Some("1:2"));
    }

    #[tokio::test]
    async fn test_remove_from_continue_watching() {
        let (svc, store, _dir) = service();
        seed_movie(&store, "tt1", 40.0, NOW - 1_000).await;

        let status = svc
            .remove_from_continue_watching(MediaType::Movie, "tt1")
            .await
            .unwrap();
        assert_eq!(status, "Removed from continue watching.");

        let list = svc.continue_watching(WatchProvider::Local, None).await.unwrap();
        assert!(list.entries.is_empty());
    }

    #[tokio::test]
    async fn test_local_library_status() {
        let (svc, _store, _dir) = service();
        let library = svc.library(WatchProvider::Local, 50).await.unwrap();
        assert!(library.folders.is_empty());
        assert_eq!(
            library.status,
            "Local source selected. Provider library unavailable."
        );
    }

    #[tokio::test]
    async fn test_library_is_sorted_and_limited() {
        let (mut svc, _store, dir) = service();

        let item = |id: &str, added: i64| crate::adapter::LibraryItem {
            content_id: id.to_string(),
            media_type: MediaType::Movie,
            title: id.to_string(),
            added_at_epoch_ms: added,
        };
        let mut adapter = MockProviderAdapter::new();
        adapter.expect_provider().return_const(WatchProvider::Trakt);
        adapter.expect_has_client_id().return_const(true);
        adapter.expect_has_access_token().return_const(true);
        adapter.expect_list_library().returning(move || {
            Ok(vec![
                LibraryFolder {
                    label: "Watchlist".to_string(),
                    items: vec![item("tt1", 100), item("tt2", 300), item("tt3", 200)],
                },
                LibraryFolder {
                    label: "Collection".to_string(),
                    items: vec![item("tt4", 50)],
                },
            ])
        });
        svc.register_adapter(Arc::new(adapter));

        let library = svc.library(WatchProvider::Trakt, 2).await.unwrap();
        assert_eq!(library.folders[0].label, "Collection");
        assert_eq!(library.folders[1].label, "Watchlist");
        let watchlist: Vec<&str> = library.folders[1]
            .items
            .iter()
            .map(|i| i.content_id.as_str())
            .collect();
        assert_eq!(watchlist, ["tt2", "tt3"]);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_watchlist_statuses() {
        let (mut svc, _store, dir) = service();

        let local = svc
            .set_in_watchlist(WatchProvider::Local, MediaType::Movie, "tt1", true)
            .await
            .unwrap();
        assert_eq!(local, "Watchlist is unavailable for local watch history.");

        let mut adapter = MockProviderAdapter::new();
        adapter.expect_provider().return_const(WatchProvider::Trakt);
        adapter.expect_has_client_id().return_const(true);
        adapter.expect_has_access_token().return_const(true);
        adapter
            .expect_set_in_watchlist()
            .returning(|_, _, _| Ok(()));
        svc.register_adapter(Arc::new(adapter));

        let added = svc
            .set_in_watchlist(WatchProvider::Trakt, MediaType::Movie, "tt1", true)
            .await
            .unwrap();
        assert_eq!(added, "Saved to watchlist.");

        let removed = svc
            .set_in_watchlist(WatchProvider::Trakt, MediaType::Movie, "tt1", false)
            .await
            .unwrap();
        assert_eq!(removed, "Removed from watchlist.");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_per_call_limit_overrides_default() {
        let (svc, store, _dir) = service();
        for i in 0..5i64 {
            seed_movie(&store, &format!("tt{i}"), 40.0, NOW - 1_000 - i).await;
        }

        let list = svc
            .continue_watching(WatchProvider::Local, Some(2))
            .await
            .unwrap();
        assert_eq!(list.entries.len(), 2);

        let list = svc.continue_watching(WatchProvider::Local, None).await.unwrap();
        assert_eq!(list.entries.len(), 5);
    }

    #[tokio::test]
    async fn test_watched_statuses_and_snapshot_invalidation() {
        let (mut svc, _store, dir) = service();

        let local = svc
            .set_watched(WatchProvider::Local, MediaType::Movie, "tt1", true)
            .await
            .unwrap();
        assert_eq!(local, "Watched status is unavailable for local watch history.");

        let mut adapter = MockProviderAdapter::new();
        adapter.expect_provider().return_const(WatchProvider::Trakt);
        adapter.expect_has_client_id().return_const(true);
        adapter.expect_has_access_token().return_const(true);
        adapter.expect_list_continue_watching().returning(|_| {
            Ok(vec![ContinueWatchingCandidate {
                media_type: MediaType::Movie,
                content_id: "tt9".to_string(),
                episode_key: None,
                progress_percent: 40.0,
                last_updated_ms: NOW - 1_000,
                is_up_next_placeholder: false,
                provider: WatchProvider::Trakt,
            }])
        });
        adapter.expect_set_watched().returning(|_, _, _| Ok(()));
        svc.register_adapter(Arc::new(adapter));

        // A live fetch lays down the snapshot file.
        svc.continue_watching(WatchProvider::Trakt, None).await.unwrap();
        let snapshot_path = dir.join("trakt_continue_watching.json");
        assert!(snapshot_path.exists());

        let marked = svc
            .set_watched(WatchProvider::Trakt, MediaType::Movie, "tt9", true)
            .await
            .unwrap();
        assert_eq!(marked, "Marked as watched.");
        assert!(!snapshot_path.exists());

        let unmarked = svc
            .set_watched(WatchProvider::Trakt, MediaType::Movie, "tt9", false)
            .await
            .unwrap();
        assert_eq!(unmarked, "Marked as unwatched.");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_rating_unavailable_locally() {
        let (svc, _store, _dir) = service();
        let status = svc
            .set_rating(WatchProvider::Local, MediaType::Movie, "tt1", Some(8))
            .await
            .unwrap();
        assert_eq!(status, "Rating is unavailable for local watch history.");
    }

    #[tokio::test]
    async fn test_rating_requires_connected_provider() {
        let (svc, _store, _dir) = service();
        let err = svc
            .set_rating(WatchProvider::Trakt, MediaType::Movie, "tt1", Some(8))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ProviderUnavailable { .. }));
    }
}
