//! Error types for the microsim streaming simulator.
//!
//! Errors are organized by component so that a failure message always names
//! the stage and the file or endpoint involved.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for microsim operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Directory listing failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Image preparation failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Sink construction or delivery failed
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while building the file catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The directory could not be listed
    #[error("Cannot list directory {path}: {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Errors raised while preparing an image payload.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Caller passed an argument outside the contract (e.g. zero binning)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The file could not be read from disk
    #[error("Read error for {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// The file could not be decoded as an image
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// The binned image could not be re-encoded
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Decode and binning did not finish in time
    #[error("Timeout preparing {path} after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },
}

/// Errors raised by stream sinks.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// A fault expected to clear shortly (e.g. partition leader election)
    #[error("Transient delivery failure for {file_name}: {message}")]
    Transient { file_name: String, message: String },

    /// The message was permanently refused (too large, HTTP 4xx, ...)
    #[error("Delivery rejected for {file_name}: {message}")]
    Rejected {
        file_name: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The sink could not be constructed or connected
    #[error("Sink unavailable: {0}")]
    Fatal(String),
}

impl DeliveryError {
    /// Whether the retry policy should attempt this delivery again.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient { .. })
    }
}

/// Convenience type alias for microsim results.
pub type Result<T> = std::result::Result<T, SimError>;
