use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Notification delivered to subscribed front-ends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A line for the log panel.
    Log {
        timestamp: DateTime<Utc>,
        message: String,
    },
    /// Short status text, e.g. for a status bar.
    Status { message: String },
    /// The run hit an error.
    Error { message: String },
    /// A single-channel run ended, successfully or not.
    Finished {
        channel: String,
        stored: Option<usize>,
    },
}

#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ControllerEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: ControllerEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.sender.subscribe()
    }

    pub fn log(&self, message: impl Into<String>) {
        self.send(ControllerEvent::Log {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub fn status(&self, message: impl Into<String>) {
        self.send(ControllerEvent::Status {
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ControllerEvent::Error {
            message: message.into(),
        });
    }

    pub fn finished(&self, channel: &str, stored: Option<usize>) {
        self.send(ControllerEvent::Finished {
            channel: channel.to_string(),
            stored,
        });
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}
