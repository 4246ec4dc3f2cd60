//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for key-value document storage and the
//! file I/O needed by offline snapshot caches.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Key-value document storage trait
///
/// Abstracts the platform's preferences-style store that holds one JSON
/// document per key:
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
/// - Desktop: config-directory backed file store
///
/// Writes to a single key are atomic: readers observe either the previous
/// document or the new one, never a torn value.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn save_marker(store: &dyn KeyValueStore) -> Result<()> {
///     store.set("@wp_tombstones", r#"{"movie:tt1":1700000000000}"#).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve the document stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a document under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the document stored under `key`
    ///
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Enumerate all `(key, document)` pairs whose key starts with `prefix`
    ///
    /// Used for full-scan reads of a keyspace (e.g. every progress record).
    async fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Clear the entire store
    ///
    /// Use with caution! This deletes every stored document.
    async fn clear_all(&self) -> Result<()>;
}

/// File system access trait
///
/// Abstracts the file operations needed for durable snapshot files:
/// - Desktop: direct filesystem access
/// - iOS/Android: sandboxed app directories
///
/// The `rename` operation is the atomicity primitive: snapshot writers stage
/// content in a temporary file and rename it over the final path.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it if it doesn't exist
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Rename a file, replacing the destination if it exists
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}
