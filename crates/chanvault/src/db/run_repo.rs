//! Run history: one row per finished channel sync.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::sync::SyncSummary;

use super::{Database, DatabaseError};

/// A recorded sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub collection: String,
    pub min_id: i64,
    pub last_id: Option<i64>,
    pub stored: u64,
    pub duplicates: u64,
    pub media_failures: u64,
    pub cancelled: bool,
    pub finished_at: String,
}

fn to_row(r: &Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        collection: r.get(0)?,
        min_id: r.get(1)?,
        last_id: r.get(2)?,
        stored: r.get(3)?,
        duplicates: r.get(4)?,
        media_failures: r.get(5)?,
        cancelled: r.get(6)?,
        finished_at: r.get(7)?,
    })
}

const COLUMNS: &str =
    "collection, min_id, last_id, stored, duplicates, media_failures, cancelled, finished_at";

pub fn record_run(db: &Database, summary: &SyncSummary) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO _sync_runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                COLUMNS
            ),
            params![
                summary.collection,
                summary.min_id,
                summary.last_id,
                summary.stored as i64,
                summary.duplicates as i64,
                summary.media_failures as i64,
                summary.cancelled,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Most recent run of a collection.
pub fn last_run(db: &Database, collection: &str) -> Result<Option<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM _sync_runs WHERE collection = ?1 ORDER BY id DESC LIMIT 1",
                    COLUMNS
                ),
                params![collection],
                to_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Latest runs across all collections, newest first.
pub fn recent_runs(db: &Database, limit: usize) -> Result<Vec<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM _sync_runs ORDER BY id DESC LIMIT ?1",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], to_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
