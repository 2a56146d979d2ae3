//! Channel collections: one table of JSON message documents per channel.
//!
//! The `id` column is an `INTEGER PRIMARY KEY`, so the highest-id lookup is an
//! index seek and duplicate ids are rejected by the database itself.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::sync::MessageRecord;

use super::{Database, DatabaseError};

/// Outcome of a best-effort batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    /// Records written by this batch.
    pub inserted: usize,
    /// Records rejected because their id was already stored.
    pub duplicates: usize,
}

/// A message document as read back from a collection.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub date: Option<String>,
    pub saved_media_path: Option<String>,
    pub document: Value,
}

/// A registered collection.
#[derive(Debug, Clone)]
pub struct CollectionRow {
    pub name: String,
    pub channel: String,
    pub created_at: String,
}

/// Quotes a collection name for use as an SQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite resolves table names case-insensitively; the lookup must agree.
fn table_exists(conn: &Connection, collection: &str) -> Result<bool, DatabaseError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![collection],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Leading `_` is reserved for bookkeeping tables, `sqlite_` by SQLite.
fn validate_name(collection: &str) -> Result<(), DatabaseError> {
    if collection.is_empty() || collection.starts_with('_')
        || collection.to_ascii_lowercase().starts_with("sqlite_")
    {
        return Err(DatabaseError::InvalidCollection(collection.to_string()));
    }
    Ok(())
}

fn ensure_collection(
    conn: &Connection,
    collection: &str,
    channel: &str,
) -> Result<(), DatabaseError> {
    validate_name(collection)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY NOT NULL,
            date TEXT,
            saved_media_path TEXT,
            document TEXT NOT NULL
        );",
        quote_ident(collection)
    ))?;
    conn.execute(
        "INSERT OR IGNORE INTO _collections (name, channel, created_at) VALUES (?1, ?2, ?3)",
        params![collection, channel, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Primary-key (or unique) violations are the only per-record failures we absorb.
fn is_duplicate(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

/// Returns whether the collection table has been created.
pub fn collection_exists(db: &Database, collection: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| table_exists(conn, collection))
}

/// Highest stored `id` in the collection, or 0 when missing or empty.
pub fn highest_id(db: &Database, collection: &str) -> Result<i64, DatabaseError> {
    validate_name(collection)?;
    db.with_conn(|conn| {
        if !table_exists(conn, collection)? {
            return Ok(0);
        }
        let latest: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT id FROM {} ORDER BY id DESC LIMIT 1",
                    quote_ident(collection)
                ),
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(latest.unwrap_or(0))
    })
}

/// Inserts every record of the batch, skipping ids that already exist.
///
/// Duplicates do not abort the remaining records. Any other failure rolls
/// back this batch and is returned; earlier batches stay committed.
pub fn insert_batch(
    db: &Database,
    collection: &str,
    channel: &str,
    records: &[MessageRecord],
) -> Result<InsertSummary, DatabaseError> {
    if records.is_empty() {
        return Ok(InsertSummary::default());
    }

    let summary = db.with_conn(|conn| {
        let tx = conn.transaction()?;
        ensure_collection(&tx, collection, channel)?;

        let mut summary = InsertSummary::default();
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (id, date, saved_media_path, document) VALUES (?1, ?2, ?3, ?4)",
                quote_ident(collection)
            ))?;

            for record in records {
                let mut document = record.to_document();
                document.insert("_id".to_string(), Value::from(record.id));
                let encoded =
                    serde_json::to_string(&document).map_err(|e| DatabaseError::Encode {
                        id: record.id,
                        source: e,
                    })?;

                match stmt.execute(params![
                    record.id,
                    record.date,
                    record.saved_media_path,
                    encoded
                ]) {
                    Ok(_) => summary.inserted += 1,
                    Err(e) if is_duplicate(&e) => summary.duplicates += 1,
                    Err(e) => {
                        return Err(DatabaseError::Insert {
                            collection: collection.to_string(),
                            id: record.id,
                            source: e,
                        })
                    }
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    })?;

    if summary.duplicates > 0 {
        log::warn!(
            "Inserted {} messages into {} ({} duplicates skipped)",
            summary.inserted,
            collection,
            summary.duplicates
        );
    } else {
        log::info!("Inserted {} messages into {}", summary.inserted, collection);
    }

    Ok(summary)
}

/// Counts stored messages in a collection.
pub fn count(db: &Database, collection: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        if !table_exists(conn, collection)? {
            return Ok(0);
        }
        let count: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(collection)),
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Returns every stored id in ascending order.
pub fn find_ids(db: &Database, collection: &str) -> Result<Vec<i64>, DatabaseError> {
    db.with_conn(|conn| {
        if !table_exists(conn, collection)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} ORDER BY id ASC",
            quote_ident(collection)
        ))?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Loads a single message document by id.
pub fn find_by_id(
    db: &Database,
    collection: &str,
    id: i64,
) -> Result<Option<StoredMessage>, DatabaseError> {
    db.with_conn(|conn| {
        if !table_exists(conn, collection)? {
            return Ok(None);
        }
        let row = conn
            .query_row(
                &format!(
                    "SELECT id, date, saved_media_path, document FROM {} WHERE id = ?1",
                    quote_ident(collection)
                ),
                params![id],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, date, saved_media_path, raw)) => {
                let document = serde_json::from_str(&raw)
                    .map_err(|e| DatabaseError::Decode { id, source: e })?;
                Ok(Some(StoredMessage {
                    id,
                    date,
                    saved_media_path,
                    document,
                }))
            }
            None => Ok(None),
        }
    })
}

/// Lists registered collections by name.
pub fn list_collections(db: &Database) -> Result<Vec<CollectionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT name, channel, created_at FROM _collections ORDER BY name")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(CollectionRow {
                    name: r.get(0)?,
                    channel: r.get(1)?,
                    created_at: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
