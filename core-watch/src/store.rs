//! # Progress Store
//!
//! The single local source of truth for per-title watch progress.
//!
//! ## Overview
//!
//! `ProgressStore` persists every piece of durable state through the injected
//! [`KeyValueStore`](bridge_traits::KeyValueStore):
//!
//! - progress records, one JSON document per key (`@watch_progress:<key>`)
//! - the tombstone ledger, a single map document (`@wp_tombstones`)
//! - continue-watching removal markers (`@continue_watching_removed`)
//! - remembered content durations (`@content_duration:<key>`)
//!
//! ## Causality
//!
//! Deletions never race resurrections: a write is accepted only when its own
//! `last_updated_epoch_ms` is strictly newer than the governing tombstone
//! (the later of the exact-key and base-key entries). Removal markers follow
//! the same rule and are cleared by causally newer writes.
//!
//! ## Notification
//!
//! Ordinary writes are coalesced: at most one `ProgressEvent::Changed` per
//! 500ms, with writes landing inside the window folded into a single delayed
//! emission. Removals and forced notifications bypass the debounce.

use crate::error::Result;
use crate::types::{MediaType, ProgressKey, ProgressRecord, ProviderSyncStatus, WatchProvider};
use bridge_traits::{Clock, KeyValueStore};
use core_runtime::events::{CoreEvent, EventBus, ProgressEvent};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

const PROGRESS_PREFIX: &str = "@watch_progress:";
const DURATION_PREFIX: &str = "@content_duration:";
const TOMBSTONES_KEY: &str = "@wp_tombstones";
const REMOVED_KEY: &str = "@continue_watching_removed";

/// TTL of the cached full-scan result.
const READ_CACHE_TTL: Duration = Duration::from_millis(5_000);
/// Delay of a coalesced change emission scheduled inside the quiet window.
const NOTIFY_DEBOUNCE: Duration = Duration::from_millis(1_000);
/// Minimum spacing between ordinary change emissions.
const MIN_NOTIFY_INTERVAL: Duration = Duration::from_millis(500);

/// A write differing less than this in playback position is a near-duplicate.
const SIGNIFICANT_TIME_CHANGE_SECONDS: f64 = 5.0;
/// A write differing less than this in duration is a near-duplicate.
const SIGNIFICANT_DURATION_CHANGE_SECONDS: f64 = 1.0;
/// Duration corrections below this threshold leave the stored record alone.
const DURATION_UPDATE_THRESHOLD_SECONDS: f64 = 60.0;

/// Behavior switches for [`ProgressStore::set_progress`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Skip near-duplicate suppression.
    pub force_write: bool,
    /// Keep the record's own `last_updated_epoch_ms` when it is positive,
    /// instead of stamping the current time.
    pub preserve_timestamp: bool,
    /// Emit the change notification immediately, bypassing the debounce.
    pub force_notify: bool,
}

/// Outcome of a [`ProgressStore::set_progress`] call.
///
/// Rejections are outcomes, not errors: a tombstoned or near-duplicate write
/// is expected behavior, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The record was persisted.
    Written,
    /// A tombstone at or after the record's timestamp rejected the write.
    SkippedTombstoned,
    /// The write changed nothing significant and was suppressed.
    SkippedNearDuplicate,
}

struct NotifierInner {
    last_emit: Option<Instant>,
    pending: Option<JoinHandle<()>>,
}

/// Debounced change-notification fanout.
///
/// `Changed` events carry no payload, so collapsing several writes into one
/// emission loses nothing.
struct Notifier {
    events: EventBus,
    inner: StdMutex<NotifierInner>,
}

impl Notifier {
    fn new(events: EventBus) -> Self {
        Self {
            events,
            inner: StdMutex::new(NotifierInner {
                last_emit: None,
                pending: None,
            }),
        }
    }

    fn notify_now(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }
        inner.last_emit = Some(Instant::now());
        drop(inner);
        self.events.emit(CoreEvent::Progress(ProgressEvent::Changed)).ok();
    }

    fn notify_debounced(self: &Arc<Self>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        // A scheduled emission already covers this write.
        if inner.pending.is_some() {
            return;
        }

        let quiet = inner
            .last_emit
            .map(|t| t.elapsed() >= MIN_NOTIFY_INTERVAL)
            .unwrap_or(true);
        if quiet {
            inner.last_emit = Some(Instant::now());
            drop(inner);
            self.events.emit(CoreEvent::Progress(ProgressEvent::Changed)).ok();
            return;
        }

        let notifier = Arc::clone(self);
        inner.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(NOTIFY_DEBOUNCE).await;
            let mut inner = notifier.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.pending = None;
            inner.last_emit = Some(Instant::now());
            drop(inner);
            notifier
                .events
                .emit(CoreEvent::Progress(ProgressEvent::Changed))
                .ok();
        }));
    }

    fn emit_removed(&self, key: String) {
        self.events
            .emit(CoreEvent::Progress(ProgressEvent::Removed { key }))
            .ok();
    }
}

struct ScanCache {
    taken_at: Instant,
    entries: Vec<(ProgressKey, ProgressRecord)>,
}

/// The local watch-progress store.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Mutations are
/// serialized through one async lock so the ledger documents (tombstones,
/// removal markers) never lose entries to interleaved read-modify-write
/// cycles.
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
    scan_cache: StdMutex<Option<ScanCache>>,
    write_lock: AsyncMutex<()>,
}

impl ProgressStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            kv,
            clock,
            notifier: Arc::new(Notifier::new(events)),
            scan_cache: StdMutex::new(None),
            write_lock: AsyncMutex::new(()),
        }
    }

    fn storage_key(key: &ProgressKey) -> String {
        format!("{}{}", PROGRESS_PREFIX, key.encode())
    }

    fn duration_key(key: &ProgressKey) -> String {
        format!("{}{}", DURATION_PREFIX, key.encode())
    }

    fn invalidate_scan_cache(&self) {
        let mut cache = self.scan_cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    /// Write a progress record.
    ///
    /// Applies, in order: tombstone causality, near-duplicate suppression,
    /// timestamp resolution, and removal-marker restoration. An accepted
    /// write clears the tombstone on its exact key. See the module docs for
    /// the governing rules.
    pub async fn set_progress(
        &self,
        key: &ProgressKey,
        record: ProgressRecord,
        opts: WriteOptions,
    ) -> Result<SetOutcome> {
        let _guard = self.write_lock.lock().await;
        self.set_progress_locked(key, record, opts).await
    }

    async fn set_progress_locked(
        &self,
        key: &ProgressKey,
        record: ProgressRecord,
        opts: WriteOptions,
    ) -> Result<SetOutcome> {
        let mut tombstones = self.tombstones().await?;
        if let Some(tomb_at) = governing_tombstone(&tombstones, key) {
            if record.last_updated_epoch_ms <= 0 || record.last_updated_epoch_ms <= tomb_at {
                debug!(key = %key, tomb_at, record_ts = record.last_updated_epoch_ms, "Write rejected by tombstone");
                return Ok(SetOutcome::SkippedTombstoned);
            }
        }

        if !opts.force_write {
            if let Some(prev) = self.progress(key).await? {
                let time_close = (record.current_time_seconds - prev.current_time_seconds).abs()
                    < SIGNIFICANT_TIME_CHANGE_SECONDS;
                let duration_close = (record.duration_seconds - prev.duration_seconds).abs()
                    < SIGNIFICANT_DURATION_CHANGE_SECONDS;
                if time_close && duration_close && record.per_provider == prev.per_provider {
                    return Ok(SetOutcome::SkippedNearDuplicate);
                }
            }
        }

        let mut record = record;
        if !(opts.preserve_timestamp && record.last_updated_epoch_ms > 0) {
            record.last_updated_epoch_ms = self.clock.unix_timestamp_millis();
        }

        // A causally newer write restores continue-watching visibility.
        let base_key = key.base().encode();
        let mut removed = self.removed_markers().await?;
        if let Some(removed_at) = removed.get(&base_key).copied() {
            if record.last_updated_epoch_ms > removed_at {
                removed.remove(&base_key);
                self.write_removed_markers(&removed).await?;
            }
        }

        // A resurrected record must stop losing to the old deletion, so the
        // accepted write retires the tombstone on its exact key. A base
        // tombstone outlives an episode resurrection; it still governs the
        // show's other keys.
        if tombstones.remove(&key.encode()).is_some() {
            self.write_tombstones(&tombstones).await?;
        }

        let doc = serde_json::to_string(&record)?;
        self.kv.set(&Self::storage_key(key), &doc).await?;
        self.invalidate_scan_cache();

        if opts.force_notify {
            self.notifier.notify_now();
        } else {
            self.notifier.notify_debounced();
        }

        Ok(SetOutcome::Written)
    }

    /// Read a single progress record. Corrupt documents decode as absent.
    pub async fn progress(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>> {
        let Some(doc) = self.kv.get(&Self::storage_key(key)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&doc) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping corrupt progress record");
                Ok(None)
            }
        }
    }

    /// Enumerate every progress record.
    ///
    /// Full-scan results are cached for a few seconds; any mutation through
    /// this store invalidates the cache.
    pub async fn all_progress(&self) -> Result<Vec<(ProgressKey, ProgressRecord)>> {
        {
            let cache = self.scan_cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.as_ref() {
                if cached.taken_at.elapsed() < READ_CACHE_TTL {
                    return Ok(cached.entries.clone());
                }
            }
        }

        let raw = self.kv.entries_with_prefix(PROGRESS_PREFIX).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for (storage_key, doc) in raw {
            let Some(encoded) = storage_key.strip_prefix(PROGRESS_PREFIX) else {
                continue;
            };
            let Some(key) = ProgressKey::parse(encoded) else {
                warn!(raw_key = %storage_key, "Skipping unparseable progress key");
                continue;
            };
            match serde_json::from_str::<ProgressRecord>(&doc) {
                Ok(record) => entries.push((key, record)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping corrupt progress record");
                }
            }
        }

        let mut cache = self.scan_cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = Some(ScanCache {
            taken_at: Instant::now(),
            entries: entries.clone(),
        });

        Ok(entries)
    }

    /// Delete a record and tombstone its exact key.
    ///
    /// Emits the removal event immediately; removals are never debounced.
    pub async fn remove_progress(&self, key: &ProgressKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.kv.delete(&Self::storage_key(key)).await?;

        let now = self.clock.unix_timestamp_millis();
        let mut tombstones = self.tombstones().await?;
        tombstones.insert(key.encode(), now);
        self.write_tombstones(&tombstones).await?;

        self.invalidate_scan_cache();
        self.notifier.notify_now();
        self.notifier.emit_removed(key.encode());

        debug!(key = %key, "Removed progress record");
        Ok(())
    }

    /// Delete every record for a piece of content (the base record plus all
    /// episode records), tombstoning each removed key and, when requested,
    /// the base key itself so future stale writes for any episode are
    /// rejected.
    ///
    /// Returns the number of deleted records.
    pub async fn remove_all_for_content(
        &self,
        media_type: MediaType,
        content_id: &str,
        base_tombstone: bool,
    ) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let base = ProgressKey::new(media_type, content_id);
        let now = self.clock.unix_timestamp_millis();

        let mut tombstones = self.tombstones().await?;
        let mut removed_count = 0usize;

        for (key, _) in self.all_progress().await? {
            if key.media_type != media_type || key.content_id != base.content_id {
                continue;
            }
            self.kv.delete(&Self::storage_key(&key)).await?;
            tombstones.insert(key.encode(), now);
            removed_count += 1;
        }

        if base_tombstone {
            tombstones.insert(base.encode(), now);
        }
        self.write_tombstones(&tombstones).await?;

        self.invalidate_scan_cache();
        self.notifier.notify_now();
        self.notifier.emit_removed(base.encode());

        debug!(key = %base, removed = removed_count, "Removed all progress for content");
        Ok(removed_count)
    }

    /// Hide a piece of content from continue-watching without deleting its
    /// progress. Cleared by any causally newer write.
    pub async fn set_removed_marker(&self, media_type: MediaType, content_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let base = ProgressKey::new(media_type, content_id);
        let mut removed = self.removed_markers().await?;
        removed.insert(base.encode(), self.clock.unix_timestamp_millis());
        self.write_removed_markers(&removed).await
    }

    /// Current removal markers as `base key → removed_at_epoch_ms`.
    pub async fn removed_markers(&self) -> Result<BTreeMap<String, i64>> {
        self.read_map(REMOVED_KEY).await
    }

    /// Current tombstone ledger as `key → deleted_at_epoch_ms`.
    pub async fn tombstones(&self) -> Result<BTreeMap<String, i64>> {
        self.read_map(TOMBSTONES_KEY).await
    }

    /// The tombstone governing a key: the later of its exact-key and
    /// base-key entries.
    pub async fn tombstone_for(&self, key: &ProgressKey) -> Result<Option<i64>> {
        let tombstones = self.tombstones().await?;
        Ok(governing_tombstone(&tombstones, key))
    }

    /// Remember an authoritative duration for a key, feeding merge synthesis.
    pub async fn set_content_duration(&self, key: &ProgressKey, duration_seconds: f64) -> Result<()> {
        if duration_seconds <= 0.0 || !duration_seconds.is_finite() {
            return Ok(());
        }
        self.kv
            .set(&Self::duration_key(key), &duration_seconds.to_string())
            .await?;
        Ok(())
    }

    pub async fn content_duration_seconds(&self, key: &ProgressKey) -> Result<Option<f64>> {
        let Some(raw) = self.kv.get(&Self::duration_key(key)).await? else {
            return Ok(None);
        };
        Ok(raw.trim().parse::<f64>().ok().filter(|d| *d > 0.0))
    }

    /// Apply a better duration to a stored record, rescaling its playback
    /// position so the percent is preserved. Corrections below the update
    /// threshold are ignored.
    ///
    /// Returns whether the record was rewritten.
    pub async fn update_progress_duration(
        &self,
        key: &ProgressKey,
        duration_seconds: f64,
    ) -> Result<bool> {
        if duration_seconds <= 0.0 || !duration_seconds.is_finite() {
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;
        self.set_content_duration(key, duration_seconds).await?;

        let Some(existing) = self.progress(key).await? else {
            return Ok(false);
        };
        if (existing.duration_seconds - duration_seconds).abs() <= DURATION_UPDATE_THRESHOLD_SECONDS {
            return Ok(false);
        }

        let percent = existing.progress_percent();
        let mut updated = existing;
        updated.duration_seconds = duration_seconds;
        updated.current_time_seconds = percent / 100.0 * duration_seconds;

        self.set_progress_locked(
            key,
            updated,
            WriteOptions {
                force_write: true,
                preserve_timestamp: true,
                force_notify: false,
            },
        )
        .await?;

        debug!(key = %key, duration_seconds, "Rescaled progress for corrected duration");
        Ok(true)
    }

    /// Records that still need to reach the given provider: never
    /// acknowledged, or mutated since the last acknowledgment. Tombstoned
    /// records are excluded.
    pub async fn unsynced_progress(
        &self,
        provider: WatchProvider,
    ) -> Result<Vec<(ProgressKey, ProgressRecord)>> {
        let tombstones = self.tombstones().await?;
        let mut out = Vec::new();

        for (key, record) in self.all_progress().await? {
            if let Some(tomb_at) = governing_tombstone(&tombstones, &key) {
                if record.last_updated_epoch_ms <= tomb_at {
                    continue;
                }
            }

            let needs_sync = match record.provider_status(provider) {
                None => true,
                Some(status) => {
                    !status.synced
                        || status
                            .last_synced_epoch_ms
                            .map(|last| record.last_updated_epoch_ms > last)
                            .unwrap_or(false)
                }
            };
            if needs_sync {
                out.push((key, record));
            }
        }

        Ok(out)
    }

    /// Record a provider acknowledgment.
    ///
    /// The acknowledged percent and the record's playback position are
    /// monotonically non-decreasing here, so a provider echoing stale state
    /// can never move progress backwards.
    pub async fn update_provider_sync_status(
        &self,
        key: &ProgressKey,
        provider: WatchProvider,
        synced: bool,
        progress_percent: Option<f64>,
        exact_time_seconds: Option<f64>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let Some(mut record) = self.progress(key).await? else {
            return Ok(());
        };

        if let Some(exact) = exact_time_seconds {
            if exact.is_finite() && exact > record.current_time_seconds {
                record.current_time_seconds = exact;
            }
        }

        let now = self.clock.unix_timestamp_millis();
        let status = record
            .per_provider
            .entry(provider)
            .or_insert_with(ProviderSyncStatus::default);
        status.synced = synced;
        if synced {
            status.last_synced_epoch_ms = Some(now);
        }
        if let Some(percent) = progress_percent {
            if percent.is_finite() {
                let percent = percent.clamp(0.0, 100.0);
                status.last_synced_progress_percent =
                    Some(match status.last_synced_progress_percent {
                        Some(prev) => prev.max(percent),
                        None => percent,
                    });
            }
        }

        self.set_progress_locked(
            key,
            record,
            WriteOptions {
                force_write: true,
                preserve_timestamp: true,
                force_notify: false,
            },
        )
        .await?;
        Ok(())
    }

    async fn read_map(&self, storage_key: &str) -> Result<BTreeMap<String, i64>> {
        let Some(doc) = self.kv.get(storage_key).await? else {
            return Ok(BTreeMap::new());
        };
        match serde_json::from_str(&doc) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(storage_key, error = %e, "Dropping corrupt ledger document");
                Ok(BTreeMap::new())
            }
        }
    }

    async fn write_tombstones(&self, tombstones: &BTreeMap<String, i64>) -> Result<()> {
        let doc = serde_json::to_string(tombstones)?;
        self.kv.set(TOMBSTONES_KEY, &doc).await?;
        Ok(())
    }

    async fn write_removed_markers(&self, removed: &BTreeMap<String, i64>) -> Result<()> {
        let doc = serde_json::to_string(removed)?;
        self.kv.set(REMOVED_KEY, &doc).await?;
        Ok(())
    }
}

fn governing_tombstone(tombstones: &BTreeMap<String, i64>, key: &ProgressKey) -> Option<i64> {
    let exact = tombstones.get(&key.encode()).copied();
    let base = if key.is_episode() {
        tombstones.get(&key.base().encode()).copied()
    } else {
        None
    };
    match (exact, base) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
