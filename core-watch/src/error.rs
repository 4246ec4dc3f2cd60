use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;
