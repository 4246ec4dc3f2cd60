//! Watch-Progress Data Model
//!
//! Defines the identity and record types shared by the progress store, the
//! merge engine and the continue-watching planner.
//!
//! ## Key Encoding
//!
//! Progress keys use the storage encoding `"type:id[:episode]"`, e.g.
//! `movie:tt0111161` or `series:tt0903747:3:7`. The episode segment is an
//! opaque suffix and may itself contain `:` separators. A key without an
//! episode segment is a *base key* and addresses the content as a whole.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of content a progress record refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }

    /// Parse a media type from its storage form. Case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(MediaType::Movie),
            "series" => Some(MediaType::Series),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watch-history provider, or the local store itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum WatchProvider {
    Trakt,
    Simkl,
    Local,
}

impl WatchProvider {
    /// Human-readable name used in status texts.
    pub fn display_name(&self) -> &'static str {
        match self {
            WatchProvider::Trakt => "Trakt",
            WatchProvider::Simkl => "Simkl",
            WatchProvider::Local => "Local",
        }
    }

    /// Lowercase identifier used in file names.
    pub fn slug(&self) -> &'static str {
        match self {
            WatchProvider::Trakt => "trakt",
            WatchProvider::Simkl => "simkl",
            WatchProvider::Local => "local",
        }
    }
}

impl fmt::Display for WatchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Identity of a progress record.
///
/// Construction normalizes the parts: ids and episode segments are trimmed,
/// and an empty episode collapses to `None`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgressKey {
    pub media_type: MediaType,
    pub content_id: String,
    pub episode: Option<String>,
}

impl ProgressKey {
    pub fn new(media_type: MediaType, content_id: impl Into<String>) -> Self {
        Self {
            media_type,
            content_id: normalize_content_id(content_id.into()),
            episode: None,
        }
    }

    pub fn with_episode(mut self, episode: impl Into<String>) -> Self {
        let episode = episode.into().trim().to_string();
        self.episode = if episode.is_empty() {
            None
        } else {
            Some(episode)
        };
        self
    }

    /// The key without its episode segment.
    pub fn base(&self) -> Self {
        Self {
            media_type: self.media_type,
            content_id: self.content_id.clone(),
            episode: None,
        }
    }

    pub fn is_episode(&self) -> bool {
        self.episode.is_some()
    }

    /// Storage encoding: `"type:id"` or `"type:id:episode"`.
    pub fn encode(&self) -> String {
        match &self.episode {
            Some(episode) => format!("{}:{}:{}", self.media_type, self.content_id, episode),
            None => format!("{}:{}", self.media_type, self.content_id),
        }
    }

    /// Parse a key from its storage encoding.
    ///
    /// Returns `None` for unknown media types or blank ids. Everything after
    /// the second separator is taken verbatim as the episode segment.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, ':');
        let media_type = MediaType::parse(parts.next()?)?;
        let content_id = parts.next()?.trim();
        if content_id.is_empty() {
            return None;
        }

        let key = ProgressKey::new(media_type, content_id);
        match parts.next() {
            Some(episode) => Some(key.with_episode(episode)),
            None => Some(key),
        }
    }
}

/// Trims the id, and lowercases imdb-form ids (`tt` plus digits) so the same
/// title never exists under two casings.
fn normalize_content_id(raw: String) -> String {
    let trimmed = raw.trim();
    let is_imdb = trimmed.len() > 2
        && trimmed[..2].eq_ignore_ascii_case("tt")
        && trimmed[2..].bytes().all(|b| b.is_ascii_digit());
    if is_imdb {
        trimmed.to_ascii_lowercase()
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Per-provider synchronization bookkeeping on a progress record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSyncStatus {
    /// Whether the provider has acknowledged the current state.
    #[serde(default)]
    pub synced: bool,
    /// When the provider last acknowledged (epoch milliseconds).
    #[serde(default)]
    pub last_synced_epoch_ms: Option<i64>,
    /// Highest progress percent ever acknowledged by the provider.
    #[serde(default)]
    pub last_synced_progress_percent: Option<f64>,
}

/// A single watch-progress record.
///
/// Unknown fields in persisted documents are ignored on decode so older
/// builds' records survive schema growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    /// Last local mutation time (epoch milliseconds). The causality anchor
    /// for tombstone and removal-marker comparisons.
    pub last_updated_epoch_ms: i64,
    #[serde(default)]
    pub per_provider: BTreeMap<WatchProvider, ProviderSyncStatus>,
}

impl ProgressRecord {
    pub fn new(current_time_seconds: f64, duration_seconds: f64, last_updated_epoch_ms: i64) -> Self {
        Self {
            current_time_seconds,
            duration_seconds,
            last_updated_epoch_ms,
            per_provider: BTreeMap::new(),
        }
    }

    /// Progress as a percentage in `[0, 100]`. Zero when the duration is
    /// unknown or non-positive.
    pub fn progress_percent(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        (self.current_time_seconds / self.duration_seconds * 100.0).clamp(0.0, 100.0)
    }

    pub fn provider_status(&self, provider: WatchProvider) -> Option<&ProviderSyncStatus> {
        self.per_provider.get(&provider)
    }
}

/// A single entry considered for the continue-watching rail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueWatchingCandidate {
    pub media_type: MediaType,
    pub content_id: String,
    /// Episode segment in key encoding (e.g. `"3:7"`), `None` for movies.
    #[serde(default)]
    pub episode_key: Option<String>,
    pub progress_percent: f64,
    pub last_updated_ms: i64,
    /// Synthetic "up next" entry with no real playback behind it. Exempt
    /// from the progress-percent filters.
    #[serde(default)]
    pub is_up_next_placeholder: bool,
    pub provider: WatchProvider,
}

impl ContinueWatchingCandidate {
    /// The progress key this candidate corresponds to.
    pub fn key(&self) -> ProgressKey {
        let key = ProgressKey::new(self.media_type, self.content_id.clone());
        match &self.episode_key {
            Some(episode) => key.with_episode(episode.clone()),
            None => key,
        }
    }
}
