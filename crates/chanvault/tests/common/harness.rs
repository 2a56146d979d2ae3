//! Test harness for isolated sync runs.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tempfile::TempDir;

use chanvault::source::{MediaRef, MessageStream};
use chanvault::sync::{SyncEvent, SyncReporter};
use chanvault::{
    Database, HistorySource, MediaStorage, MessageKind, SourceError, SourceMessage, SyncEngine,
};

/// A channel post with a text field.
pub fn post(id: i64) -> SourceMessage {
    let mut fields = Map::new();
    fields.insert("id".to_string(), Value::from(id));
    fields.insert("type".to_string(), Value::from("message"));
    fields.insert("text".to_string(), Value::from(format!("post {}", id)));
    SourceMessage {
        id,
        kind: MessageKind::Message,
        date: Some(format!("2026-03-01T00:{:02}:00", id % 60)),
        media: None,
        fields,
    }
}

/// A channel post carrying one photo.
pub fn post_with_media(id: i64) -> SourceMessage {
    let mut message = post(id);
    message.media = Some(MediaRef {
        locator: format!("photo_{}.jpg", id),
        media_type: Some("photo".to_string()),
    });
    message
}

/// A service event (not a post).
pub fn service(id: i64) -> SourceMessage {
    let mut message = post(id);
    message.kind = MessageKind::Service;
    message.fields.insert("type".to_string(), Value::from("service"));
    message
}

/// Posts with ids `from..=to`.
pub fn posts(from: i64, to: i64) -> Vec<SourceMessage> {
    (from..=to).map(post).collect()
}

/// In-memory history source.
#[derive(Default)]
pub struct ScriptedSource {
    channels: HashMap<String, Vec<SourceMessage>>,
    failing_downloads: HashSet<i64>,
    /// Yield an error instead of the message with this id.
    fail_at: Option<i64>,
    /// Return every message regardless of the requested cursor.
    ignore_min_id: bool,
    delay: Option<Duration>,
    requested_min_ids: Mutex<Vec<i64>>,
    downloads: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(mut self, name: &str, messages: Vec<SourceMessage>) -> Self {
        self.channels.insert(name.to_string(), messages);
        self
    }

    pub fn failing_download(mut self, id: i64) -> Self {
        self.failing_downloads.insert(id);
        self
    }

    pub fn fail_at(mut self, id: i64) -> Self {
        self.fail_at = Some(id);
        self
    }

    pub fn ignoring_min_id(mut self) -> Self {
        self.ignore_min_id = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requested_min_ids(&self) -> Vec<i64> {
        self.requested_min_ids.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistorySource for ScriptedSource {
    async fn iter_messages(
        &self,
        channel: &str,
        min_id: i64,
    ) -> Result<MessageStream<'_>, SourceError> {
        self.requested_min_ids.lock().unwrap().push(min_id);

        let name = chanvault::collection_name(channel).unwrap_or_default();
        let messages = self
            .channels
            .get(&name)
            .ok_or_else(|| SourceError::ChannelNotFound(channel.to_string()))?;

        let fail_at = self.fail_at;
        let items: Vec<Result<SourceMessage, SourceError>> = messages
            .iter()
            .filter(|m| self.ignore_min_id || m.id > min_id)
            .cloned()
            .map(|m| {
                if Some(m.id) == fail_at {
                    Err(SourceError::ConnectionFailed(format!(
                        "connection reset at {}",
                        m.id
                    )))
                } else {
                    Ok(m)
                }
            })
            .collect();

        let delay = self.delay;
        Ok(stream::iter(items)
            .then(move |item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed())
    }

    async fn download_media(
        &self,
        message: &SourceMessage,
        destination: &Path,
    ) -> Result<Option<PathBuf>, SourceError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        let Some(media) = &message.media else {
            return Ok(None);
        };
        if self.failing_downloads.contains(&message.id) {
            return Err(SourceError::MediaUnavailable {
                id: message.id,
                reason: "simulated download failure".to_string(),
            });
        }

        let path = destination.join(&media.locator);
        tokio::fs::write(&path, format!("media of {}", message.id))
            .await
            .map_err(|e| SourceError::Io {
                path: path.clone(),
                source: e,
            })?;
        Ok(Some(path))
    }
}

/// Records every engine event; optionally clears a running flag once a
/// number of messages has been processed.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<SyncEvent>>,
    stop: Option<(usize, Arc<AtomicBool>)>,
    processed: AtomicUsize,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopping_after(processed: usize, flag: Arc<AtomicBool>) -> Self {
        Self {
            stop: Some((processed, flag)),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Sizes of the flushed batches in order.
    pub fn flush_sizes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SyncEvent::Flushed {
                    inserted,
                    duplicates,
                    ..
                } => Some(inserted + duplicates),
                _ => None,
            })
            .collect()
    }

    /// Number of messages processed before each flush.
    pub fn processed_before_flushes(&self) -> Vec<usize> {
        let mut processed = 0;
        let mut marks = Vec::new();
        for event in self.events() {
            match event {
                SyncEvent::Processed { .. } => processed += 1,
                SyncEvent::Flushed { .. } => marks.push(processed),
                _ => {}
            }
        }
        marks
    }
}

impl SyncReporter for RecordingReporter {
    fn report(&self, event: SyncEvent) {
        if let SyncEvent::Processed { .. } = event {
            let seen = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, flag)) = &self.stop {
                if seen == *after {
                    flag.store(false, Ordering::SeqCst);
                }
            }
        }
        self.events.lock().unwrap().push(event);
    }
}

/// Isolated database and media directories.
pub struct TestEnv {
    temp_dir: TempDir,
    pub db: Database,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("data").join("test.db"))
            .expect("Failed to open test database");
        Self { temp_dir, db }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root().join("downloads")
    }

    pub fn engine(&self, source: Arc<dyn HistorySource>) -> SyncEngine {
        let media = MediaStorage::new(self.downloads_dir(), self.root())
            .expect("Failed to set up media storage");
        SyncEngine::new(source, self.db.clone(), media)
    }
}
