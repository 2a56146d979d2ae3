use std::path::PathBuf;
use thiserror::Error;

use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Invalid channel identifier '{0}'")]
    InvalidChannel(String),

    #[error("A sync is already running")]
    AlreadyRunning,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' must be set")]
    MissingVar(&'static str),

    #[error("Environment variable '{name}' is invalid: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("Failed to read channel list '{path}': {source}")]
    ReadChannelList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not resolve the current working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to resolve path '{path}': {source}")]
    ResolvePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
