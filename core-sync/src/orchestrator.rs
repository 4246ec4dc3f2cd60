//! # Sync Orchestrator
//!
//! Runs push and pull sync jobs against one provider adapter, recording the
//! outcome on the event bus.
//!
//! Push jobs send locally dirty records and mark them acknowledged one by
//! one, so a mid-run failure loses nothing: whatever was not acknowledged
//! stays dirty and goes out on the next run. Pull jobs drain the provider's
//! full progress view through the merge engine.

use crate::adapter::{ProviderAdapter, RemoteProgressEntry};
use crate::error::{Result, SyncError};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_watch::merge::{MergeOutcome, ProviderMergeEngine, RemoteProgress};
use core_watch::store::ProgressStore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Records at or above this percent are reported to providers as finished.
const PUSH_COMPLETION_PERCENT: f64 = 85.0;

/// Counts from a finished sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub items_pushed: u64,
    pub items_merged: u64,
    pub items_failed: u64,
}

pub struct SyncOrchestrator {
    store: Arc<ProgressStore>,
    engine: Arc<ProviderMergeEngine>,
    events: EventBus,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<ProgressStore>, engine: Arc<ProviderMergeEngine>, events: EventBus) -> Self {
        Self { store, engine, events }
    }

    fn ensure_usable(adapter: &dyn ProviderAdapter) -> Result<()> {
        if !adapter.has_client_id() || !adapter.has_access_token() {
            return Err(SyncError::ProviderUnavailable {
                provider: adapter.provider().display_name().to_string(),
            });
        }
        Ok(())
    }

    /// Push every record still dirty for the adapter's provider.
    pub async fn push_unsynced(&self, adapter: &dyn ProviderAdapter) -> Result<SyncReport> {
        Self::ensure_usable(adapter)?;

        let provider = adapter.provider();
        let job_id = Uuid::new_v4().to_string();
        self.events
            .emit(CoreEvent::Sync(SyncEvent::Started {
                job_id: job_id.clone(),
                provider: provider.display_name().to_string(),
                direction: "push".to_string(),
            }))
            .ok();

        let dirty = self.store.unsynced_progress(provider).await?;
        debug!(provider = %provider, count = dirty.len(), "Pushing unsynced progress");

        let mut report = SyncReport::default();
        for (key, record) in dirty {
            let percent = record.progress_percent();
            // Providers treat near-complete playback as watched.
            let push_percent = if percent >= PUSH_COMPLETION_PERCENT {
                100.0
            } else {
                percent
            };

            let entry = RemoteProgressEntry {
                media_type: key.media_type,
                content_id: key.content_id.clone(),
                episode_key: key.episode.clone(),
                percent: push_percent,
                paused_at_epoch_ms: record.last_updated_epoch_ms,
                exact_time_seconds: Some(record.current_time_seconds),
            };

            match adapter.push_progress(&entry).await {
                Ok(()) => {
                    self.store
                        .update_provider_sync_status(&key, provider, true, Some(push_percent), None)
                        .await?;
                    report.items_pushed += 1;
                }
                Err(e) => {
                    warn!(key = %key, provider = %provider, error = %e, "Push failed, record stays unsynced");
                    report.items_failed += 1;
                }
            }
        }

        self.events
            .emit(CoreEvent::Sync(SyncEvent::Completed {
                job_id,
                provider: provider.display_name().to_string(),
                items_pushed: report.items_pushed,
                items_merged: 0,
                items_failed: report.items_failed,
            }))
            .ok();

        info!(provider = %provider, pushed = report.items_pushed, failed = report.items_failed, "Push sync finished");
        Ok(report)
    }

    /// Pull the provider's full progress view and merge it into the local
    /// store.
    pub async fn pull_and_merge(&self, adapter: &dyn ProviderAdapter) -> Result<SyncReport> {
        Self::ensure_usable(adapter)?;

        let provider = adapter.provider();
        let job_id = Uuid::new_v4().to_string();
        self.events
            .emit(CoreEvent::Sync(SyncEvent::Started {
                job_id: job_id.clone(),
                provider: provider.display_name().to_string(),
                direction: "pull".to_string(),
            }))
            .ok();

        let entries = match adapter.pull_progress().await {
            Ok(entries) => entries,
            Err(e) => {
                self.events
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        job_id,
                        provider: provider.display_name().to_string(),
                        message: e.to_string(),
                        recoverable: true,
                    }))
                    .ok();
                return Err(e);
            }
        };

        let mut report = SyncReport::default();
        for entry in entries {
            let Some(key) = entry_key(&entry) else {
                debug!(content_id = %entry.content_id, "Skipping remote entry with invalid identity");
                continue;
            };
            let remote = RemoteProgress {
                percent: entry.percent,
                paused_at_epoch_ms: entry.paused_at_epoch_ms,
                exact_time_seconds: entry.exact_time_seconds,
            };
            match self.engine.merge(&key, provider, &remote).await? {
                MergeOutcome::Written | MergeOutcome::SyncStatusOnly => report.items_merged += 1,
                MergeOutcome::Skipped => {}
            }
        }

        self.events
            .emit(CoreEvent::Sync(SyncEvent::Completed {
                job_id,
                provider: provider.display_name().to_string(),
                items_pushed: 0,
                items_merged: report.items_merged,
                items_failed: 0,
            }))
            .ok();

        info!(provider = %provider, merged = report.items_merged, "Pull sync finished");
        Ok(report)
    }
}

fn entry_key(entry: &RemoteProgressEntry) -> Option<core_watch::types::ProgressKey> {
    let id = entry.content_id.trim();
    if id.is_empty() {
        return None;
    }
    let key = core_watch::types::ProgressKey::new(entry.media_type, id);
    Some(match &entry.episode_key {
        Some(episode) => key.with_episode(episode.clone()),
        None => key,
    })
}
