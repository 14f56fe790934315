use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The host refused to start playback without a user gesture.
    #[error("Playback blocked by autoplay policy")]
    AutoplayBlocked,

    #[error("Media source could not be loaded: {0}")]
    LoadFailed(String),

    /// Requested position lies outside the media the host has available.
    #[error("Position out of range: {0}")]
    OutOfRange(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
