//! Front-end controller over the sync engine.
//!
//! Runs are spawned on the current tokio runtime so the caller's event loop
//! keeps turning; progress arrives as [`ControllerEvent`]s. Only one run (or
//! batch of runs) is in flight at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::broadcast::{ControllerEvent, EventBroadcaster};
use crate::error::{Result, SyncError};
use crate::sync::{BroadcastReporter, SyncEngine, SyncSummary};

/// Pause between channels of a batch run.
pub const DEFAULT_CHANNEL_PAUSE: Duration = Duration::from_secs(1);

pub struct SyncController {
    engine: Arc<SyncEngine>,
    events: EventBroadcaster,
    running: Arc<AtomicBool>,
    abort_batch: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    pause: Duration,
}

/// Releases the busy flag when a spawned run ends, even on panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncController {
    pub fn new(engine: Arc<SyncEngine>, events: EventBroadcaster) -> Self {
        Self {
            engine,
            events,
            running: Arc::new(AtomicBool::new(false)),
            abort_batch: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
            pause: DEFAULT_CHANNEL_PAUSE,
        }
    }

    /// Overrides the pause between channels of [`sync_all`](Self::sync_all).
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Whether a run or batch is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRunning)?;
        Ok(BusyGuard(Arc::clone(&self.busy)))
    }

    /// Starts syncing one channel in the background.
    pub fn start_sync(&self, channel: &str) -> Result<JoinHandle<Option<SyncSummary>>> {
        let guard = self.acquire()?;
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let events = self.events.clone();
        let channel = channel.to_string();

        // A stop issued before the task is first polled must stick.
        running.store(true, Ordering::SeqCst);
        events.log(format!("Starting sync process for {}...", channel));

        Ok(tokio::spawn(async move {
            let _guard = guard;
            run_channel(&engine, &channel, &running, &events).await
        }))
    }

    /// Syncs every channel in order, one full run at a time, pausing between
    /// channels. Stops at the next channel boundary when aborted.
    pub fn sync_all(&self, channels: Vec<String>) -> Result<JoinHandle<Vec<SyncSummary>>> {
        if channels.is_empty() {
            self.events.error("No channels to sync.");
            return Ok(tokio::spawn(async { Vec::new() }));
        }

        let guard = self.acquire()?;
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let abort = Arc::clone(&self.abort_batch);
        let events = self.events.clone();
        let pause = self.pause;

        abort.store(false, Ordering::SeqCst);
        running.store(true, Ordering::SeqCst);
        events.log("Starting batch sync for all channels...");

        Ok(tokio::spawn(async move {
            let _guard = guard;
            let total = channels.len();
            let mut summaries = Vec::with_capacity(total);

            for (i, channel) in channels.iter().enumerate() {
                if i > 0 {
                    running.store(true, Ordering::SeqCst);
                }
                // Checked after re-arming: a stop landing in between still wins.
                if abort.load(Ordering::SeqCst) {
                    running.store(false, Ordering::SeqCst);
                    events.log("Batch sync aborted by user.");
                    break;
                }

                events.log(format!(
                    "--- Processing channel {}/{}: {} ---",
                    i + 1,
                    total,
                    channel
                ));
                if let Some(summary) = run_channel(&engine, channel, &running, &events).await {
                    summaries.push(summary);
                }

                if i + 1 < total {
                    tokio::time::sleep(pause).await;
                }
            }

            events.status("Batch sync finished");
            events.log("Batch sync process completed.");
            summaries
        }))
    }

    /// Asks the current run to stop and cancels any remaining batch channels.
    pub fn stop_sync(&self) {
        self.abort_batch.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.events.log("Stopping sync...");
    }
}

/// One engine run with controller notifications around it. The caller arms
/// `running`; it is cleared when the run ends.
async fn run_channel(
    engine: &SyncEngine,
    channel: &str,
    running: &AtomicBool,
    events: &EventBroadcaster,
) -> Option<SyncSummary> {
    let outcome = if channel.trim().is_empty() {
        events.error("Error: No channel selected or CHANNEL_NAME not set");
        None
    } else {
        let reporter = BroadcastReporter::new(events.clone());
        match engine.sync(channel, running, &reporter).await {
            Ok(summary) => {
                info!("Channel '{}' synced: {} new messages", channel, summary.stored);
                Some(summary)
            }
            Err(e) => {
                error!("Sync of '{}' failed: {}", channel, e);
                events.error(format!("An error occurred: {}", e));
                events.log(format!("Error: {}", e));
                None
            }
        }
    };

    running.store(false, Ordering::Release);
    events.status("Finished");
    events.finished(channel, outcome.as_ref().map(|s| s.stored));
    outcome
}
