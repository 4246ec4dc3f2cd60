//! # Provider Merge Engine
//!
//! Folds remote provider progress into the local [`ProgressStore`].
//!
//! ## Overview
//!
//! Providers report progress as a percentage, sometimes with an exact
//! playback position and a pause timestamp. The engine decides, per entry,
//! between three outcomes:
//!
//! - a full record write (remote state meaningfully differs from local)
//! - a sync-status-only update (remote agrees within tolerance, so only the
//!   provider bookkeeping changes)
//! - a skip (invalid entry, or the local tombstone wins)
//!
//! One exception to the tolerance rule: a 100% report is always applied even
//! when the local record already sits near completion, so completions
//! propagate exactly.

use crate::error::Result;
use crate::store::{ProgressStore, SetOutcome, WriteOptions};
use crate::types::{MediaType, ProgressKey, ProgressRecord, ProviderSyncStatus, WatchProvider};
use bridge_traits::Clock;
use std::sync::Arc;
use tracing::debug;

/// Remote and local percent must differ by at least this much for a remote
/// report to rewrite the local record.
const MIN_PROGRESS_DIFF_PERCENT: f64 = 5.0;
/// An exact remote position implies a duration; the implied value replaces
/// the stored one only when they disagree by more than this.
const DURATION_RECALC_THRESHOLD_SECONDS: f64 = 300.0;

const MOVIE_DURATION_ESTIMATE_SECONDS: f64 = 6_600.0;
const EPISODE_DURATION_ESTIMATE_SECONDS: f64 = 2_700.0;
const FALLBACK_DURATION_ESTIMATE_SECONDS: f64 = 3_600.0;

/// Progress for one title as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProgress {
    pub percent: f64,
    /// When the provider last saw playback (epoch milliseconds), zero or
    /// negative when unknown.
    pub paused_at_epoch_ms: i64,
    /// Exact playback position, when the provider exposes one.
    pub exact_time_seconds: Option<f64>,
}

/// What a merge call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The local record was rewritten from the remote report.
    Written,
    /// Only the provider's sync bookkeeping was updated.
    SyncStatusOnly,
    /// The entry was invalid or lost to a tombstone.
    Skipped,
}

/// Merges remote progress reports into the local store.
pub struct ProviderMergeEngine {
    store: Arc<ProgressStore>,
    clock: Arc<dyn Clock>,
}

impl ProviderMergeEngine {
    pub fn new(store: Arc<ProgressStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Merge one remote report.
    pub async fn merge(
        &self,
        key: &ProgressKey,
        provider: WatchProvider,
        remote: &RemoteProgress,
    ) -> Result<MergeOutcome> {
        if !remote.percent.is_finite() {
            debug!(key = %key, provider = %provider, "Skipping non-finite remote percent");
            return Ok(MergeOutcome::Skipped);
        }
        let percent = remote.percent.clamp(0.0, 100.0);
        let exact = remote
            .exact_time_seconds
            .filter(|t| t.is_finite() && *t >= 0.0);

        let remote_ts = if remote.paused_at_epoch_ms > 0 {
            remote.paused_at_epoch_ms
        } else {
            self.clock.unix_timestamp_millis()
        };

        let Some(local) = self.store.progress(key).await? else {
            return self
                .synthesize(key, provider, percent, exact, remote_ts)
                .await;
        };

        let local_percent = local.progress_percent();
        let within_tolerance = (percent - local_percent).abs() < MIN_PROGRESS_DIFF_PERCENT
            && percent < 100.0
            && local_percent < 100.0;
        if within_tolerance {
            self.store
                .update_provider_sync_status(key, provider, true, Some(percent), exact)
                .await?;
            return Ok(MergeOutcome::SyncStatusOnly);
        }

        let mut record = local;
        match exact {
            Some(exact_time) => {
                record.current_time_seconds = exact_time;
                // The exact position plus the percent imply a duration; trust
                // it over a stale or estimated stored value.
                if percent > 0.0 {
                    let implied = exact_time / (percent / 100.0);
                    if record.duration_seconds <= 0.0
                        || (implied - record.duration_seconds).abs()
                            > DURATION_RECALC_THRESHOLD_SECONDS
                    {
                        record.duration_seconds = implied;
                    }
                }
            }
            None => {
                if record.duration_seconds <= 0.0 {
                    record.duration_seconds = self.resolve_duration(key, percent, None).await?;
                }
                record.current_time_seconds = percent / 100.0 * record.duration_seconds;
            }
        }

        record.last_updated_epoch_ms = remote_ts;
        record.per_provider.insert(
            provider,
            ProviderSyncStatus {
                synced: true,
                last_synced_epoch_ms: Some(self.clock.unix_timestamp_millis()),
                last_synced_progress_percent: Some(percent),
            },
        );

        let outcome = self
            .store
            .set_progress(
                key,
                record,
                WriteOptions {
                    force_write: true,
                    preserve_timestamp: true,
                    force_notify: false,
                },
            )
            .await?;

        Ok(match outcome {
            SetOutcome::SkippedTombstoned => MergeOutcome::Skipped,
            _ => MergeOutcome::Written,
        })
    }

    /// Build a local record from scratch for a title only the provider knows
    /// about.
    async fn synthesize(
        &self,
        key: &ProgressKey,
        provider: WatchProvider,
        percent: f64,
        exact: Option<f64>,
        remote_ts: i64,
    ) -> Result<MergeOutcome> {
        let duration = self.resolve_duration(key, percent, exact).await?;
        let current = match exact {
            Some(exact_time) => exact_time,
            None => percent / 100.0 * duration,
        };

        let mut record = ProgressRecord::new(current, duration, remote_ts);
        record.per_provider.insert(
            provider,
            ProviderSyncStatus {
                synced: true,
                last_synced_epoch_ms: Some(self.clock.unix_timestamp_millis()),
                last_synced_progress_percent: Some(percent),
            },
        );

        let outcome = self
            .store
            .set_progress(
                key,
                record,
                WriteOptions {
                    force_write: true,
                    preserve_timestamp: true,
                    force_notify: false,
                },
            )
            .await?;

        Ok(match outcome {
            SetOutcome::SkippedTombstoned => MergeOutcome::Skipped,
            _ => MergeOutcome::Written,
        })
    }

    /// Best available duration for a key: remembered value first, then the
    /// one implied by an exact position, then a type-based estimate.
    async fn resolve_duration(
        &self,
        key: &ProgressKey,
        percent: f64,
        exact: Option<f64>,
    ) -> Result<f64> {
        if let Some(remembered) = self.store.content_duration_seconds(key).await? {
            return Ok(remembered);
        }
        if let Some(exact_time) = exact {
            if percent > 0.0 {
                return Ok(exact_time / (percent / 100.0));
            }
        }
        Ok(estimate_duration(key))
    }
}

fn estimate_duration(key: &ProgressKey) -> f64 {
    if key.is_episode() {
        EPISODE_DURATION_ESTIMATE_SECONDS
    } else {
        match key.media_type {
            MediaType::Movie => MOVIE_DURATION_ESTIMATE_SECONDS,
            MediaType::Series => FALLBACK_DURATION_ESTIMATE_SECONDS,
        }
    }
}
