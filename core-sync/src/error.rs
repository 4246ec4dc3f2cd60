use bridge_traits::BridgeError;
use core_watch::WatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{provider} is not connected")]
    ProviderUnavailable { provider: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Watch state error: {0}")]
    Watch(#[from] WatchError),

    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
