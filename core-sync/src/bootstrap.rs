//! # Core Assembly
//!
//! Builds the whole watch stack from one validated [`CoreConfig`]: event
//! bus, progress store, merge engine, sync orchestrator and the watch
//! history service, all sharing the injected bridges.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::CoreConfig;
//! use core_sync::WatchCore;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .key_value_store(Arc::new(kv_store))
//!     .file_system(Arc::new(file_system))
//!     .snapshot_dir("/data/snapshots")
//!     .build()?;
//! let mut core = WatchCore::initialize(config)?;
//! core.register_adapter(Arc::new(trakt_adapter));
//! # Ok::<(), core_runtime::Error>(())
//! ```

use crate::adapter::ProviderAdapter;
use crate::orchestrator::SyncOrchestrator;
use crate::service::WatchHistoryService;
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_watch::merge::ProviderMergeEngine;
use core_watch::snapshot::SnapshotCache;
use core_watch::store::ProgressStore;
use std::sync::Arc;
use tracing::info;

/// The assembled watch stack.
pub struct WatchCore {
    pub events: EventBus,
    pub store: Arc<ProgressStore>,
    pub merge: Arc<ProviderMergeEngine>,
    pub orchestrator: SyncOrchestrator,
    pub service: WatchHistoryService,
}

impl WatchCore {
    /// Assemble every component from a validated configuration.
    pub fn initialize(config: CoreConfig) -> core_runtime::Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let store = Arc::new(ProgressStore::new(
            Arc::clone(&config.key_value_store),
            Arc::clone(&config.clock),
            events.clone(),
        ));
        let merge = Arc::new(ProviderMergeEngine::new(
            Arc::clone(&store),
            Arc::clone(&config.clock),
        ));
        let snapshots = Arc::new(SnapshotCache::new(
            Arc::clone(&config.file_system),
            config.snapshot_dir.clone(),
            Arc::clone(&config.clock),
        ));
        let orchestrator =
            SyncOrchestrator::new(Arc::clone(&store), Arc::clone(&merge), events.clone());
        let service = WatchHistoryService::new(
            Arc::clone(&store),
            snapshots,
            Arc::clone(&config.clock),
        );

        info!(snapshot_dir = ?config.snapshot_dir, "Watch core initialized");
        Ok(Self {
            events,
            store,
            merge,
            orchestrator,
            service,
        })
    }

    /// Register a provider adapter with the service.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.service.register_adapter(adapter);
    }
}
