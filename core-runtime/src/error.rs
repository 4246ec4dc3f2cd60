use thiserror::Error;

/// Failures surfaced while assembling the core: invalid settings or a
/// platform bridge the host forgot to inject.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing capability {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
