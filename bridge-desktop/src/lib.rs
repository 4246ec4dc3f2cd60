//! # Desktop Bridge Implementations
//!
//! Native implementations of the [`bridge-traits`](bridge_traits) contracts
//! for desktop hosts.
//!
//! ## Provided Adapters
//!
//! - [`FileKeyValueStore`] - `KeyValueStore` backed by a single JSON file with
//!   atomic temp-file + rename persistence
//! - [`TokioFileSystem`] - `FileSystemAccess` backed by `tokio::fs`

pub mod filesystem;
pub mod store;

pub use filesystem::TokioFileSystem;
pub use store::FileKeyValueStore;
