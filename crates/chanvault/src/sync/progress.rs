use crate::broadcast::EventBroadcaster;

use super::SyncSummary;

/// Events emitted by the engine while a channel is synchronized.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Resuming {
        collection: String,
        min_id: i64,
    },
    Fetching {
        channel: String,
        min_id: i64,
    },
    Downloading {
        message_id: i64,
    },
    MediaSaved {
        message_id: i64,
        path: String,
    },
    MediaFailed {
        message_id: i64,
        error: String,
    },
    Processed {
        message_id: i64,
    },
    Flushed {
        inserted: usize,
        duplicates: usize,
        stored_so_far: usize,
    },
    Stopped,
    Completed(SyncSummary),
}

pub trait SyncReporter: Send + Sync {
    fn report(&self, event: SyncEvent);
}

/// No-op reporter for unit tests.
pub struct NoopReporter;

impl SyncReporter for NoopReporter {
    fn report(&self, _event: SyncEvent) {}
}

/// Bridges engine events to the controller's log and status notifications.
pub struct BroadcastReporter {
    events: EventBroadcaster,
}

impl BroadcastReporter {
    pub fn new(events: EventBroadcaster) -> Self {
        Self { events }
    }
}

impl SyncReporter for BroadcastReporter {
    fn report(&self, event: SyncEvent) {
        match event {
            SyncEvent::Resuming { collection, min_id } => {
                self.events.log(format!(
                    "Checking database for existing messages in collection '{}'...",
                    collection
                ));
                self.events
                    .log(format!("Last synced message ID: {}", min_id));
            }
            SyncEvent::Fetching { channel, min_id } => {
                self.events.log(format!(
                    "Fetching messages from {} starting from ID {}...",
                    channel, min_id
                ));
                self.events.status("Syncing messages...");
            }
            SyncEvent::Downloading { message_id } => {
                self.events
                    .log(format!("Downloading media for message {}...", message_id));
            }
            SyncEvent::MediaSaved { path, .. } => {
                self.events.log(format!("Media saved to: {}", path));
            }
            SyncEvent::MediaFailed { message_id, error } => {
                self.events.log(format!(
                    "Failed to download media for message {}: {}",
                    message_id, error
                ));
            }
            SyncEvent::Processed { .. } => {}
            SyncEvent::Flushed { stored_so_far, .. } => {
                self.events
                    .log(format!("Synced {} messages so far...", stored_so_far));
            }
            SyncEvent::Stopped => {
                self.events.log("Sync stopped by user.");
            }
            SyncEvent::Completed(summary) => {
                if !summary.cancelled {
                    self.events.log(format!(
                        "Sync completed. Total new messages: {}",
                        summary.stored
                    ));
                    self.events.status("Done.");
                }
            }
        }
    }
}
