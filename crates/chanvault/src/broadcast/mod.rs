//! Broadcasting of controller notifications.
//!
//! Front-ends subscribe to receive log lines, status updates, errors and
//! completion of sync runs as they happen.

pub mod events;

pub use events::{ControllerEvent, EventBroadcaster};
