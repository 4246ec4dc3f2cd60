//! # Core Configuration Module
//!
//! Provides configuration management for the Watch Platform Core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core
//! library. It enforces fail-fast validation to ensure all required bridges
//! are provided before initialization.
//!
//! ## Required Dependencies
//!
//! - `KeyValueStore` - Required for progress records, tombstones and markers
//! - `FileSystemAccess` - Required for offline snapshot files
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Time source (defaults to [`SystemClock`])
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .key_value_store(Arc::new(my_kv_store))
//!     .file_system(Arc::new(my_file_system))
//!     .snapshot_dir("/path/to/snapshots")
//!     .build()?;
//! # Ok::<(), core_runtime::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable
//! error messages when capabilities are missing.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, FileSystemAccess, KeyValueStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the Watch Platform Core.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Key-value document storage (required)
    pub key_value_store: Arc<dyn KeyValueStore>,

    /// File system access for snapshot files (required)
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Directory for offline snapshot files
    pub snapshot_dir: PathBuf,

    /// Buffer size of the broadcast event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("key_value_store", &"KeyValueStore { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("clock", &"Clock { ... }")
            .field("snapshot_dir", &self.snapshot_dir)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Snapshot directory is not empty
    /// - Event buffer size is greater than zero
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Snapshot directory cannot be empty".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then call
/// [`build()`](CoreConfigBuilder::build) to create the final config. The
/// builder validates required dependencies and provides helpful error
/// messages.
#[derive(Default)]
pub struct CoreConfigBuilder {
    key_value_store: Option<Arc<dyn KeyValueStore>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    clock: Option<Arc<dyn Clock>>,
    snapshot_dir: Option<PathBuf>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the key-value store implementation (required).
    ///
    /// The store holds progress records, the tombstone ledger, removal
    /// markers and remembered content durations.
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_value_store = Some(store);
        self
    }

    /// Sets the file system access implementation (required).
    ///
    /// Used by the snapshot cache for its per-provider listing files.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the time source.
    ///
    /// Defaults to [`SystemClock`]. Tests inject fixed clocks here.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the directory for offline snapshot files (required).
    pub fn snapshot_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_dir = Some(path.into());
        self
    }

    /// Sets the buffer size of the broadcast event bus.
    ///
    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`].
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// This validates all required dependencies are provided and returns an
    /// error with an actionable message if anything is missing.
    pub fn build(self) -> Result<CoreConfig> {
        let key_value_store = self.key_value_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "KeyValueStore".to_string(),
            message: "KeyValueStore implementation is required for progress persistence. \
                     Desktop: inject bridge_desktop::FileKeyValueStore. \
                     Mobile: inject a platform-native preferences adapter."
                .to_string(),
        })?;

        let file_system = self.file_system.ok_or_else(|| Error::CapabilityMissing {
            capability: "FileSystemAccess".to_string(),
            message: "FileSystemAccess implementation is required for offline snapshots. \
                     Desktop: inject bridge_desktop::TokioFileSystem. \
                     Mobile: inject a sandboxed app-directory adapter."
                .to_string(),
        })?;

        let snapshot_dir = self.snapshot_dir.ok_or_else(|| {
            Error::Config("Snapshot directory is required. Use .snapshot_dir() to set it.".to_string())
        })?;

        let config = CoreConfig {
            key_value_store,
            file_system,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            snapshot_dir,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::BridgeError;
    use bytes::Bytes;
    use std::path::{Path, PathBuf};

    // Mock implementations for testing
    struct MockKeyValueStore;

    #[async_trait]
    impl KeyValueStore for MockKeyValueStore {
        async fn get(&self, _key: &str) -> std::result::Result<Option<String>, BridgeError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn keys_with_prefix(
            &self,
            _prefix: &str,
        ) -> std::result::Result<Vec<String>, BridgeError> {
            Ok(Vec::new())
        }

        async fn entries_with_prefix(
            &self,
            _prefix: &str,
        ) -> std::result::Result<Vec<(String, String)>, BridgeError> {
            Ok(Vec::new())
        }

        async fn clear_all(&self) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    struct MockFileSystem;

    #[async_trait]
    impl FileSystemAccess for MockFileSystem {
        async fn exists(&self, _path: &Path) -> std::result::Result<bool, BridgeError> {
            Ok(false)
        }

        async fn create_dir_all(&self, _path: &Path) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn read_file(&self, _path: &Path) -> std::result::Result<Bytes, BridgeError> {
            Err(BridgeError::NotAvailable("mock".to_string()))
        }

        async fn write_file(
            &self,
            _path: &Path,
            _data: Bytes,
        ) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn rename(
            &self,
            _from: &Path,
            _to: &Path,
        ) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn delete_file(&self, _path: &Path) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn list_directory(
            &self,
            _path: &Path,
        ) -> std::result::Result<Vec<PathBuf>, BridgeError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_builder_requires_key_value_store() {
        let result = CoreConfig::builder()
            .file_system(Arc::new(MockFileSystem))
            .snapshot_dir("/snapshots")
            .build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("KeyValueStore"));
        assert!(err_msg.contains("progress persistence"));
    }

    #[test]
    fn test_builder_requires_file_system() {
        let result = CoreConfig::builder()
            .key_value_store(Arc::new(MockKeyValueStore))
            .snapshot_dir("/snapshots")
            .build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("FileSystemAccess"));
        assert!(err_msg.contains("offline snapshots"));
    }

    #[test]
    fn test_builder_requires_snapshot_dir() {
        let result = CoreConfig::builder()
            .key_value_store(Arc::new(MockKeyValueStore))
            .file_system(Arc::new(MockFileSystem))
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Snapshot directory is required"));
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let result = CoreConfig::builder()
            .key_value_store(Arc::new(MockKeyValueStore))
            .file_system(Arc::new(MockFileSystem))
            .snapshot_dir("/snapshots")
            .build();

        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.snapshot_dir, PathBuf::from("/snapshots"));
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let result = CoreConfig::builder()
            .key_value_store(Arc::new(MockKeyValueStore))
            .file_system(Arc::new(MockFileSystem))
            .snapshot_dir("/snapshots")
            .event_buffer_size(0)
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must be greater than 0"));
    }

    #[test]
    fn test_default_clock_is_system_clock() {
        let config = CoreConfig::builder()
            .key_value_store(Arc::new(MockKeyValueStore))
            .file_system(Arc::new(MockFileSystem))
            .snapshot_dir("/snapshots")
            .build()
            .unwrap();

        assert!(config.clock.unix_timestamp_millis() > 0);
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = CoreConfig::builder()
            .key_value_store(Arc::new(MockKeyValueStore))
            .file_system(Arc::new(MockFileSystem))
            .snapshot_dir("/snapshots")
            .event_buffer_size(32)
            .build()
            .unwrap();

        let cloned = config.clone();
        assert_eq!(cloned.snapshot_dir, config.snapshot_dir);
        assert_eq!(cloned.event_buffer_size, 32);
    }
}
