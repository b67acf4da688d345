//! Error types for the chime device controller

use thiserror::Error;

/// Result type alias for chime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the device controller
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio peripheral error
    #[error("audio error: {0}")]
    Audio(String),

    /// Byte store error (blob open/read/write)
    #[error("storage error: {0}")]
    Storage(String),

    /// Network link error (join/AP mode)
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Provisioning portal error
    #[error("provisioning error: {0}")]
    Provisioning(String),

    /// Upload/poll/playback transfer error
    #[error("transfer error: {0}")]
    Transfer(String),

    /// Poll phase exhausted its attempt budget
    #[error("response poll timed out after {0} attempts")]
    PollTimeout(u32),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
