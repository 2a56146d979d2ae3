use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// Name is empty or collides with an internal table.
    #[error("'{0}' cannot be used as a collection name")]
    InvalidCollection(String),

    /// A record failed for a reason other than an already stored id.
    #[error("Failed to insert message {id} into '{collection}': {source}")]
    Insert {
        collection: String,
        id: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to encode message {id}: {source}")]
    Encode {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored document {id} is not valid JSON: {source}")]
    Decode {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,
}
