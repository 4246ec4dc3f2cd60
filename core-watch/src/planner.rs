//! # Continue-Watching Planner
//!
//! Pure ranking of continue-watching candidates. No IO, no clock reads; the
//! caller supplies `now` so the plan is deterministic and testable.
//!
//! ## Pipeline
//!
//! normalize, filter (staleness, then progress bounds), dedupe by identity,
//! order by recency, truncate.

use crate::types::ContinueWatchingCandidate;
use std::collections::BTreeMap;

/// Entries untouched for longer than this are dropped.
const STALE_WINDOW_MS: i64 = 30 * 24 * 60 * 60 * 1_000;
/// Entries below this percent are noise from accidental playback starts.
const MIN_PROGRESS_PERCENT: f64 = 2.0;
/// Entries at or above this percent count as finished.
const COMPLETION_PERCENT: f64 = 85.0;

/// Rank candidates into the final continue-watching list.
///
/// Filters, in order:
/// - blank content ids are dropped
/// - anything older than the stale window is dropped, placeholders included
/// - real entries outside `[2%, 85%)` are dropped; up-next placeholders are
///   exempt from the progress bounds
///
/// Duplicates sharing `(media_type, content_id, episode_key)` collapse to the
/// most recently updated one; on equal recency a real entry beats a
/// placeholder. The result is ordered newest first, with ties broken by
/// `(content_id, episode_key)` ascending so equal-recency input order never
/// matters, and truncated to `max_items`.
pub fn plan_continue_watching(
    candidates: Vec<ContinueWatchingCandidate>,
    now_ms: i64,
    max_items: usize,
) -> Vec<ContinueWatchingCandidate> {
    let mut deduped: BTreeMap<(String, Option<String>, String), ContinueWatchingCandidate> =
        BTreeMap::new();

    for mut candidate in candidates {
        candidate.content_id = candidate.content_id.trim().to_string();
        if candidate.content_id.is_empty() {
            continue;
        }
        candidate.episode_key = candidate
            .episode_key
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        candidate.progress_percent = if candidate.progress_percent.is_finite() {
            candidate.progress_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };

        if now_ms - candidate.last_updated_ms > STALE_WINDOW_MS {
            continue;
        }
        if !candidate.is_up_next_placeholder
            && (candidate.progress_percent < MIN_PROGRESS_PERCENT
                || candidate.progress_percent >= COMPLETION_PERCENT)
        {
            continue;
        }

        let identity = (
            candidate.content_id.clone(),
            candidate.episode_key.clone(),
            candidate.media_type.as_str().to_string(),
        );
        match deduped.get(&identity) {
            Some(existing) => {
                let newer = candidate.last_updated_ms > existing.last_updated_ms;
                let tie_prefers_real = candidate.last_updated_ms == existing.last_updated_ms
                    && existing.is_up_next_placeholder
                    && !candidate.is_up_next_placeholder;
                if newer || tie_prefers_real {
                    deduped.insert(identity, candidate);
                }
            }
            None => {
                deduped.insert(identity, candidate);
            }
        }
    }

    let mut plan: Vec<ContinueWatchingCandidate> = deduped.into_values().collect();
    plan.sort_by(|a, b| {
        b.last_updated_ms
            .cmp(&a.last_updated_ms)
            .then_with(|| a.content_id.cmp(&b.content_id))
            .then_with(|| a.episode_key.cmp(&b.episode_key))
    });
    plan.truncate(max_items);
    plan
}
