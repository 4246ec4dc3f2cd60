//! # Core Runtime
//!
//! Ambient infrastructure shared by every crate in the Watch Platform Core:
//! configuration, the broadcast event bus, and logging setup.
//!
//! ## Overview
//!
//! - [`config`] - `CoreConfig` builder with fail-fast capability validation
//! - [`events`] - typed `EventBus` over `tokio::sync::broadcast`
//! - [`logging`] - `tracing-subscriber` initialization
//! - [`error`] - shared runtime error type

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, ProgressEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
