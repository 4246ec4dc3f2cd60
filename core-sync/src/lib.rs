//! # Core Sync
//!
//! Everything that talks to watch-history providers: the adapter port, the
//! push/pull sync orchestrator, and the user-facing watch history service.
//!
//! ## Overview
//!
//! - [`adapter`] - the `ProviderAdapter` port and its exchange types
//! - [`orchestrator`] - push/pull sync jobs with event-bus reporting
//! - [`service`] - continue-watching, library, rating and watchlist facade
//! - [`bootstrap`] - `WatchCore` assembly from a `CoreConfig`
//! - [`error`] - sync error type

pub mod adapter;
pub mod bootstrap;
pub mod error;
pub mod orchestrator;
pub mod service;

pub use adapter::{LibraryFolder, LibraryItem, ProviderAdapter, RemoteProgressEntry};
pub use bootstrap::WatchCore;
pub use error::{Result, SyncError};
pub use orchestrator::{SyncOrchestrator, SyncReport};
pub use service::{ContinueWatchingList, LibraryList, WatchHistoryService};
