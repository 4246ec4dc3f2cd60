//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the watch core and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that must be implemented differently per platform (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Storage
//! - [`KeyValueStore`](storage::KeyValueStore) - Atomic key→JSON-document storage
//!   backing progress records, tombstones and markers
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for offline
//!   snapshot files, including the rename primitive used for atomic writes
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! pub fn new(config: CoreConfig) -> Result<Self> {
//!     let kv = config.key_value_store
//!         .ok_or_else(|| Error::CapabilityMissing {
//!             capability: "KeyValueStore".to_string(),
//!             message: "No key-value store implementation provided. \
//!                      Desktop: inject bridge_desktop::FileKeyValueStore. \
//!                      Mobile: inject a platform-native adapter.".to_string()
//!         })?;
//!     // ...
//! }
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling. Platform implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Provide actionable error messages
//! - Include error context (e.g., file paths)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use storage::{FileSystemAccess, KeyValueStore};
pub use time::{Clock, SystemClock};
