//! SQLite-backed document store.
//!
//! Each channel is a table of JSON documents keyed by message id; the
//! bookkeeping tables (`_collections`, `_sync_runs`) come from `migrations`.
//! A `Database` is a shared handle over one connection.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod message_repo;
pub mod migrations;
pub mod run_repo;

pub use error::DatabaseError;
pub use message_repo::InsertSummary;

use crate::sync::{MessageRecord, SyncSummary};

/// How long a write waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database file, creating parent directories and bringing the
    /// schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let db = Self::init(conn)?;
        log::info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Resume cursor of a collection: its highest stored id, or 0.
    pub fn highest_id(&self, collection: &str) -> Result<i64, DatabaseError> {
        message_repo::highest_id(self, collection)
    }

    pub fn insert_batch(
        &self,
        collection: &str,
        channel: &str,
        records: &[MessageRecord],
    ) -> Result<InsertSummary, DatabaseError> {
        message_repo::insert_batch(self, collection, channel, records)
    }

    pub fn record_run(&self, summary: &SyncSummary) -> Result<(), DatabaseError> {
        run_repo::record_run(self, summary)
    }
}

/// Resolves the database file from a `DATABASE_URI` style location and a
/// database name: `{location}/{name}.db`. A leading `sqlite://` is ignored.
pub fn database_file(location: &str, name: &str) -> PathBuf {
    let location = location.strip_prefix("sqlite://").unwrap_or(location);
    PathBuf::from(location).join(format!("{}.db", name))
}

/// Returns the default database directory: `~/.chanvault/data`.
pub fn default_database_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".chanvault").join("data"))
}
