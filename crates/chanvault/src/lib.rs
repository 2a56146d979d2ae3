pub mod broadcast;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod sanitize;
pub mod source;
pub mod storage;
pub mod sync;

pub use broadcast::{ControllerEvent, EventBroadcaster};
pub use config::{load_channel_list, Settings};
pub use controller::SyncController;
pub use db::{Database, DatabaseError, InsertSummary};
pub use error::{ConfigError, Result, StorageError, SyncError};
pub use source::{ExportArchiveSource, HistorySource, MessageKind, SourceError, SourceMessage};
pub use storage::MediaStorage;
pub use sync::{collection_name, MessageRecord, SyncEngine, SyncSummary, BATCH_SIZE};
