//! # Core Watch
//!
//! Local watch-progress state and the logic around it.
//!
//! ## Overview
//!
//! - [`types`] - progress keys, records, and continue-watching candidates
//! - [`store`] - the durable progress store with tombstone causality and
//!   debounced change notification
//! - [`merge`] - folding remote provider reports into the local store
//! - [`planner`] - pure ranking of the continue-watching rail
//! - [`snapshot`] - last-good provider responses persisted to disk
//!
//! ## Usage
//!
//! ```ignore
//! use core_watch::store::{ProgressStore, WriteOptions};
//! use core_watch::types::{MediaType, ProgressKey, ProgressRecord};
//!
//! let key = ProgressKey::new(MediaType::Movie, "tt0111161");
//! store
//!     .set_progress(&key, ProgressRecord::new(600.0, 8520.0, 0), WriteOptions::default())
//!     .await?;
//! ```

pub mod error;
pub mod merge;
pub mod planner;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::{Result, WatchError};
pub use merge::{MergeOutcome, ProviderMergeEngine, RemoteProgress};
pub use planner::plan_continue_watching;
pub use snapshot::{SnapshotCache, SnapshotEnvelope, SnapshotKind};
pub use store::{ProgressStore, SetOutcome, WriteOptions};
pub use types::{
    ContinueWatchingCandidate, MediaType, ProgressKey, ProgressRecord, ProviderSyncStatus,
    WatchProvider,
};
