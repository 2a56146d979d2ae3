//! History source error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a channel history source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The channel could not be found or reached.
    #[error("Channel '{0}' not found")]
    ChannelNotFound(String),

    /// Failed to connect to the platform.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to decode a history payload.
    #[error("Failed to parse history for '{channel}': {source}")]
    Parse {
        channel: String,
        #[source]
        source: serde_json::Error,
    },

    /// A message in the history is malformed.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The attached media is not available for download.
    #[error("Media for message {id} is unavailable: {reason}")]
    MediaUnavailable { id: i64, reason: String },

    /// IO error while reading history or writing media.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
