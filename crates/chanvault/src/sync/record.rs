//! Flat message records as written to a collection.

use serde_json::{Map, Value};

use crate::source::SourceMessage;

/// A message ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: i64,
    pub date: Option<String>,
    /// All platform fields of the message.
    pub fields: Map<String, Value>,
    /// Media location relative to the storage root, when media was saved.
    pub saved_media_path: Option<String>,
}

impl MessageRecord {
    pub fn from_message(message: &SourceMessage) -> Self {
        Self {
            id: message.id,
            date: message.date.clone(),
            fields: message.fields.clone(),
            saved_media_path: None,
        }
    }

    /// The JSON document stored for this record.
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = self.fields.clone();
        document.insert("id".to_string(), Value::from(self.id));
        if let Some(path) = &self.saved_media_path {
            document.insert("saved_media_path".to_string(), Value::from(path.clone()));
        }
        document
    }
}
