//! Channel history sources.
//!
//! A source yields a channel's messages oldest-first and can fetch the media
//! attached to a message. The live platform client lives outside this crate;
//! `ExportArchiveSource` reads desktop JSON exports.

pub mod error;
pub mod export;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::{Map, Value};

pub use error::SourceError;
pub use export::ExportArchiveSource;

/// Kind of history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// An ordinary channel post.
    Message,
    /// Service events (joins, pins, title changes, ...).
    Service,
}

/// Attached media as described by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Source-specific locator of the file.
    pub locator: String,
    /// Media type label, e.g. `photo` or `video_file`.
    pub media_type: Option<String>,
}

/// One entry of a channel's history.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub id: i64,
    pub kind: MessageKind,
    pub date: Option<String>,
    pub media: Option<MediaRef>,
    /// Every platform field of the entry, untouched.
    pub fields: Map<String, Value>,
}

impl SourceMessage {
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

/// Lazy oldest-to-newest message stream.
pub type MessageStream<'a> = BoxStream<'a, error::Result<SourceMessage>>;

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Streams messages of `channel` with an id strictly greater than
    /// `min_id`, in ascending id order.
    async fn iter_messages(&self, channel: &str, min_id: i64)
        -> error::Result<MessageStream<'_>>;

    /// Saves the message's media under `destination` and returns the path of
    /// the saved file, or `None` when there was nothing to save.
    async fn download_media(
        &self,
        message: &SourceMessage,
        destination: &Path,
    ) -> error::Result<Option<PathBuf>>;
}
