//! Error types for the reader crate.

use nation_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while talking to a reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// I/O error on the link or a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Configuration or catalogue file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request rejected before anything was sent, or reader refused a write.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The link was closed by the other side.
    #[error("transport disconnected")]
    Disconnected,

    /// No answer within the allotted time.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// A write is already waiting for its result.
    #[error("a write is already in progress")]
    WriteInProgress,

    /// No write is waiting for a result.
    #[error("no write in progress")]
    NoWriteInProgress,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Product id not present in the catalogue.
    #[error("unknown product: {0}")]
    UnknownProduct(String),
}

/// Result type alias for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;
