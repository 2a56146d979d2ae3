//! Incremental channel synchronization.
//!
//! A run resumes from the highest id already stored, streams newer messages
//! oldest-first, saves their media and writes records in batches of
//! [`BATCH_SIZE`]. The primary key on `id` is the authoritative duplicate
//! guard; the resume cursor only avoids refetching.

pub mod progress;
pub mod record;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::db::Database;
use crate::error::{Result, SyncError};
use crate::source::{HistorySource, MessageKind, SourceMessage};
use crate::storage::MediaStorage;

pub use progress::{BroadcastReporter, NoopReporter, SyncEvent, SyncReporter};
pub use record::MessageRecord;

/// Records accumulated before a flush.
pub const BATCH_SIZE: usize = 100;

/// Collection name for a channel handle or URL: its last path segment.
///
/// Returns `None` when nothing usable is left.
pub fn collection_name(channel: &str) -> Option<String> {
    let name = channel
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub collection: String,
    /// Resume cursor the run started from.
    pub min_id: i64,
    /// New records stored this run.
    pub stored: usize,
    /// Records the database already had.
    pub duplicates: usize,
    /// Service events that were not stored.
    pub skipped: usize,
    pub media_saved: usize,
    pub media_failures: usize,
    /// Number of batch flushes performed.
    pub batches: usize,
    /// Highest id handed to storage this run.
    pub last_id: Option<i64>,
    /// The run was stopped before the end of the history.
    pub cancelled: bool,
}

/// Synchronizes channels from a history source into the database.
pub struct SyncEngine {
    source: Arc<dyn HistorySource>,
    db: Database,
    media: MediaStorage,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn HistorySource>, db: Database, media: MediaStorage) -> Self {
        Self { source, db, media }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs one sync of `channel`.
    ///
    /// `running` is checked before each message; clearing it ends the run
    /// early, after flushing what has accumulated.
    pub async fn sync(
        &self,
        channel: &str,
        running: &AtomicBool,
        reporter: &dyn SyncReporter,
    ) -> Result<SyncSummary> {
        let collection = collection_name(channel)
            .ok_or_else(|| SyncError::InvalidChannel(channel.to_string()))?;
        let span = info_span!("channel_sync", collection = %collection);

        self.run(channel, collection, running, reporter)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        channel: &str,
        collection: String,
        running: &AtomicBool,
        reporter: &dyn SyncReporter,
    ) -> Result<SyncSummary> {
        info!("Checking collection '{}' for existing messages", collection);
        let min_id = self.db.highest_id(&collection)?;
        info!("Last synced message ID: {}", min_id);
        reporter.report(SyncEvent::Resuming {
            collection: collection.clone(),
            min_id,
        });

        let mut summary = SyncSummary {
            collection: collection.clone(),
            min_id,
            ..Default::default()
        };

        reporter.report(SyncEvent::Fetching {
            channel: channel.to_string(),
            min_id,
        });
        let mut messages = self.source.iter_messages(channel, min_id).await?;
        let mut batch: Vec<MessageRecord> = Vec::with_capacity(BATCH_SIZE);

        loop {
            if !running.load(Ordering::Acquire) {
                info!("Sync of '{}' stopped by user", collection);
                summary.cancelled = true;
                reporter.report(SyncEvent::Stopped);
                break;
            }

            let Some(item) = messages.next().await else {
                break;
            };
            let message = item?;

            if message.kind != MessageKind::Message {
                debug!("Skipping service event {}", message.id);
                summary.skipped += 1;
                continue;
            }

            let mut record = MessageRecord::from_message(&message);
            if message.has_media() {
                reporter.report(SyncEvent::Downloading {
                    message_id: message.id,
                });
                match self.save_media(&collection, &message).await {
                    Ok(Some(path)) => {
                        summary.media_saved += 1;
                        reporter.report(SyncEvent::MediaSaved {
                            message_id: message.id,
                            path: path.clone(),
                        });
                        record.saved_media_path = Some(path);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed to download media for message {}: {}", message.id, e);
                        summary.media_failures += 1;
                        reporter.report(SyncEvent::MediaFailed {
                            message_id: message.id,
                            error: e.to_string(),
                        });
                    }
                }
            }

            summary.last_id = Some(message.id);
            batch.push(record);
            reporter.report(SyncEvent::Processed {
                message_id: message.id,
            });

            if batch.len() >= BATCH_SIZE {
                self.flush(&collection, channel, &mut batch, &mut summary, reporter)?;
            }
        }

        self.flush(&collection, channel, &mut batch, &mut summary, reporter)?;

        info!(
            stored = summary.stored,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            media_failures = summary.media_failures,
            "Sync of '{}' finished",
            collection
        );
        if let Err(e) = self.db.record_run(&summary) {
            warn!("Failed to record run history for '{}': {}", collection, e);
        }
        reporter.report(SyncEvent::Completed(summary.clone()));

        Ok(summary)
    }

    /// Downloads a message's media into its own directory and returns the
    /// storage-root-relative path of the saved file.
    async fn save_media(
        &self,
        collection: &str,
        message: &SourceMessage,
    ) -> Result<Option<String>> {
        let dir = self.media.prepare_message_dir(collection, message.id).await?;
        debug!("Downloading media for message {} into {}", message.id, dir.display());

        match self.source.download_media(message, &dir).await? {
            Some(saved) => {
                info!("Media saved to: {}", saved.display());
                Ok(Some(self.media.relative_path(&saved)?))
            }
            None => Ok(None),
        }
    }

    fn flush(
        &self,
        collection: &str,
        channel: &str,
        batch: &mut Vec<MessageRecord>,
        summary: &mut SyncSummary,
        reporter: &dyn SyncReporter,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let result = self.db.insert_batch(collection, channel, batch)?;
        batch.clear();

        summary.stored += result.inserted;
        summary.duplicates += result.duplicates;
        summary.batches += 1;
        reporter.report(SyncEvent::Flushed {
            inserted: result.inserted,
            duplicates: result.duplicates,
            stored_so_far: summary.stored,
        });
        Ok(())
    }
}
