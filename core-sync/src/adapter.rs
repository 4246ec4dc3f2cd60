//! # Provider Adapter Port
//!
//! The trait a watch-history provider integration implements. Adapters own
//! authentication, HTTP, and response mapping; the sync layer above only
//! sees domain types.
//!
//! Credential checks are split in two because the failure modes differ to
//! the user: a missing client id means the app build is not configured for
//! the provider, a missing access token means the user has not connected
//! their account.

use crate::error::Result;
use async_trait::async_trait;
use core_watch::types::{ContinueWatchingCandidate, MediaType, WatchProvider};
use serde::{Deserialize, Serialize};

/// One title's progress as exchanged with a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProgressEntry {
    pub media_type: MediaType,
    pub content_id: String,
    /// Episode segment in key encoding, `None` for movies.
    #[serde(default)]
    pub episode_key: Option<String>,
    pub percent: f64,
    /// When the provider last saw playback (epoch milliseconds), zero or
    /// negative when unknown.
    pub paused_at_epoch_ms: i64,
    /// Exact playback position, when the provider exposes one.
    #[serde(default)]
    pub exact_time_seconds: Option<f64>,
}

/// An item in a provider library folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub content_id: String,
    pub media_type: MediaType,
    pub title: String,
    pub added_at_epoch_ms: i64,
}

/// A named grouping of library items (watchlist, collection, list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryFolder {
    pub label: String,
    pub items: Vec<LibraryItem>,
}

/// Port implemented per watch-history provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider(&self) -> WatchProvider;

    /// Whether the user has connected their account.
    fn has_access_token(&self) -> bool;

    /// Whether the build carries API credentials for this provider.
    fn has_client_id(&self) -> bool;

    /// Report one title's progress to the provider.
    async fn push_progress(&self, entry: &RemoteProgressEntry) -> Result<()>;

    /// Fetch all progress the provider knows about.
    async fn pull_progress(&self) -> Result<Vec<RemoteProgressEntry>>;

    /// Fetch the provider's own continue-watching view.
    async fn list_continue_watching(&self, now_ms: i64) -> Result<Vec<ContinueWatchingCandidate>>;

    /// Fetch the provider library (watchlist, collections, lists).
    async fn list_library(&self) -> Result<Vec<LibraryFolder>>;

    /// Mark or unmark a title as watched in the provider history.
    async fn set_watched(
        &self,
        media_type: MediaType,
        content_id: &str,
        watched: bool,
    ) -> Result<()>;

    /// Rate a title, or clear the rating with `None`.
    async fn set_rating(
        &self,
        media_type: MediaType,
        content_id: &str,
        rating: Option<u8>,
    ) -> Result<()>;

    /// Add or remove a title from the provider watchlist.
    async fn set_in_watchlist(
        &self,
        media_type: MediaType,
        content_id: &str,
        in_watchlist: bool,
    ) -> Result<()>;
}
