//! History source backed by desktop JSON exports.
//!
//! Expects one export per channel at `{export_dir}/{collection}/result.json`,
//! where `{collection}` is the sanitized channel name. Media referenced by the
//! export (`photo` / `file` fields) is resolved against that export folder and
//! copied into the destination on download.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::{Result, SourceError};
use super::{HistorySource, MediaRef, MessageKind, MessageStream, SourceMessage};

/// Prefix the exporter writes in place of media it skipped.
const NOT_INCLUDED_PREFIX: &str = "(File ";

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    messages: Vec<Map<String, Value>>,
}

/// Reads channel history from desktop exports on disk.
pub struct ExportArchiveSource {
    export_dir: PathBuf,
}

impl ExportArchiveSource {
    pub fn new<P: AsRef<Path>>(export_dir: P) -> Self {
        Self {
            export_dir: export_dir.as_ref().to_path_buf(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Folder holding the export for a channel.
    pub fn channel_dir(&self, channel: &str) -> Result<PathBuf> {
        let name = crate::sync::collection_name(channel)
            .ok_or_else(|| SourceError::ChannelNotFound(channel.to_string()))?;
        Ok(self.export_dir.join(name))
    }

    async fn load(&self, channel: &str) -> Result<(PathBuf, ExportFile)> {
        let dir = self.channel_dir(channel)?;
        let path = dir.join("result.json");

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::ChannelNotFound(channel.to_string()));
            }
            Err(e) => return Err(SourceError::Io { path, source: e }),
        };

        let export = serde_json::from_slice(&raw).map_err(|e| SourceError::Parse {
            channel: channel.to_string(),
            source: e,
        })?;
        Ok((dir, export))
    }
}

fn parse_entry(dir: &Path, fields: Map<String, Value>) -> Result<SourceMessage> {
    let id = fields
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| SourceError::MalformedMessage(format!("missing id in {:?}", fields)))?;

    let kind = match fields.get("type").and_then(Value::as_str) {
        Some("message") => MessageKind::Message,
        _ => MessageKind::Service,
    };

    let date = fields.get("date").and_then(Value::as_str).map(str::to_string);

    let media = ["photo", "file"].iter().find_map(|key| {
        fields.get(*key).and_then(Value::as_str).map(|locator| {
            let locator = if locator.starts_with(NOT_INCLUDED_PREFIX) {
                locator.to_string()
            } else {
                dir.join(locator).to_string_lossy().into_owned()
            };
            let media_type = match *key {
                "photo" => Some("photo".to_string()),
                _ => fields
                    .get("media_type")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
            MediaRef {
                locator,
                media_type,
            }
        })
    });

    Ok(SourceMessage {
        id,
        kind,
        date,
        media,
        fields,
    })
}

#[async_trait]
impl HistorySource for ExportArchiveSource {
    async fn iter_messages(&self, channel: &str, min_id: i64) -> Result<MessageStream<'_>> {
        let (dir, export) = self.load(channel).await?;

        let mut messages = export
            .messages
            .into_iter()
            .map(|fields| parse_entry(&dir, fields))
            .collect::<Result<Vec<_>>>()?;
        messages.retain(|m| m.id > min_id);
        messages.sort_by_key(|m| m.id);

        debug!(
            "Export for '{}' has {} messages newer than {}",
            channel,
            messages.len(),
            min_id
        );

        Ok(stream::iter(messages.into_iter().map(Ok)).boxed())
    }

    async fn download_media(
        &self,
        message: &SourceMessage,
        destination: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(media) = &message.media else {
            return Ok(None);
        };

        if media.locator.starts_with(NOT_INCLUDED_PREFIX) {
            return Err(SourceError::MediaUnavailable {
                id: message.id,
                reason: media.locator.clone(),
            });
        }

        let from = PathBuf::from(&media.locator);
        let file_name = from
            .file_name()
            .ok_or_else(|| SourceError::MediaUnavailable {
                id: message.id,
                reason: format!("no file name in '{}'", media.locator),
            })?;

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| SourceError::Io {
                path: destination.to_path_buf(),
                source: e,
            })?;

        let to = destination.join(file_name);
        tokio::fs::copy(&from, &to)
            .await
            .map_err(|e| SourceError::Io {
                path: from.clone(),
                source: e,
            })?;

        Ok(Some(to))
    }
}
