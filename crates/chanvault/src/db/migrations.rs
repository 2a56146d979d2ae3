//! Versioned schema for the bookkeeping tables.
//!
//! Channel tables have no fixed schema version; `message_repo` creates them
//! when a channel is first written. Everything else lives here, applied in
//! version order and recorded in `_migrations`.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

const MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "create_collections_table",
        include_str!("sql/001_create_collections.sql"),
    ),
    (
        2,
        "create_sync_runs_table",
        include_str!("sql/002_create_sync_runs.sql"),
    ),
];

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(v, _, _)| *v).unwrap_or(0)
}

/// Version recorded in the database, 0 for a fresh file.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM _migrations", [], |r| r.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Brings the schema up to [`latest_version`].
///
/// Each migration and its `_migrations` row commit together, so an
/// interrupted upgrade resumes at the failed step.
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let from = current_version(conn)?;
    let pending = MIGRATIONS.iter().filter(|(version, _, _)| *version > from);

    for &(version, description, sql) in pending {
        log::info!("Applying schema v{} ({})", version, description);

        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| DatabaseError::Migration {
                version,
                reason: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            params![version, description],
        )?;
        tx.commit()?;
    }

    Ok(())
}
