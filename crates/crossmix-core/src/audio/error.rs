//! Audio backend error types

use thiserror::Error;

/// Errors from the output backend
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio output devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Named device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to query device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build the output stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the output stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Device sample format not supported by the engine
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
