//! Command-line entry point.
//!
//! Without flags the default channel (`CHANNEL_NAME`) is synced once. With
//! `--all` every channel of `CHANNELS_FILE` is synced in turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use secrecy::ExposeSecret;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chanvault::db::run_repo;
use chanvault::sanitize::redact_secret;
use chanvault::sync::{SyncEvent, SyncReporter};
use chanvault::{
    load_channel_list, ControllerEvent, Database, EventBroadcaster, ExportArchiveSource,
    MediaStorage, Settings, SyncController, SyncEngine,
};

#[derive(Parser)]
#[command(name = "chanvault")]
#[command(about = "Archive channel history into SQLite and media onto disk", long_about = None)]
#[command(version)]
struct Cli {
    /// Sync every channel listed in CHANNELS_FILE, one after another
    #[arg(long)]
    all: bool,
}

/// Progress line printed for an engine event, if any.
fn progress_line(event: &SyncEvent) -> Option<String> {
    let line = match event {
        SyncEvent::Resuming { collection, min_id } => format!(
            "Checking database for existing messages in collection '{}'...\nLast synced message ID: {}",
            collection, min_id
        ),
        SyncEvent::Fetching { channel, min_id } => {
            format!("Fetching messages from {} starting from ID {}...", channel, min_id)
        }
        SyncEvent::Downloading { message_id } => {
            format!("Downloading media for message {}...", message_id)
        }
        SyncEvent::MediaSaved { path, .. } => format!("Media saved to: {}", path),
        SyncEvent::MediaFailed { message_id, error } => {
            format!("Failed to download media for message {}: {}", message_id, error)
        }
        SyncEvent::Processed { .. } => return None,
        SyncEvent::Flushed {
            inserted,
            duplicates: 0,
            ..
        } => format!("Inserted {} messages", inserted),
        SyncEvent::Flushed {
            inserted,
            duplicates,
            ..
        } => format!("Inserted {} messages ({} already stored)", inserted, duplicates),
        SyncEvent::Stopped => "Sync stopped by user.".to_string(),
        SyncEvent::Completed(summary) if summary.cancelled => format!(
            "Sync interrupted. New messages stored before the stop: {}",
            summary.stored
        ),
        SyncEvent::Completed(summary) => {
            format!("Sync completed. Total new messages: {}", summary.stored)
        }
    };
    Some(line)
}

/// Prints run progress to standard output.
struct StdoutReporter;

impl SyncReporter for StdoutReporter {
    fn report(&self, event: SyncEvent) {
        if let Some(line) = progress_line(&event) {
            println!("{}", line);
        }
    }
}

fn print_controller_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::Log { message, .. } => println!("{}", message),
        ControllerEvent::Error { message } => eprintln!("{}", message),
        ControllerEvent::Status { .. } | ControllerEvent::Finished { .. } => {}
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn log_previous_run(db: &Database, channel: &str) -> anyhow::Result<()> {
    if let Some(collection) = chanvault::collection_name(channel) {
        if let Some(run) = run_repo::last_run(db, &collection)? {
            info!(
                stored = run.stored,
                cancelled = run.cancelled,
                "Previous run of '{}' finished at {}",
                collection,
                run.finished_at
            );
        }
    }
    Ok(())
}

async fn sync_default(settings: &Settings, engine: SyncEngine) -> anyhow::Result<()> {
    let channel = settings
        .channel_name
        .clone()
        .context("CHANNEL_NAME not set in settings or .env")?;
    log_previous_run(engine.database(), &channel)?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Received interrupt, stopping after the current message...");
        handler_flag.store(false, Ordering::Release);
    })
    .context("failed to install Ctrl+C handler")?;

    let summary = engine.sync(&channel, &running, &StdoutReporter).await?;
    info!(
        stored = summary.stored,
        duplicates = summary.duplicates,
        media_failures = summary.media_failures,
        cancelled = summary.cancelled,
        "Run finished for '{}'",
        summary.collection
    );
    Ok(())
}

async fn sync_listed(settings: &Settings, engine: SyncEngine) -> anyhow::Result<()> {
    let channels = load_channel_list(&settings.channels_file, settings.channel_name.as_deref())?;
    if channels.is_empty() {
        anyhow::bail!(
            "no channels in '{}' and CHANNEL_NAME not set",
            settings.channels_file.display()
        );
    }
    for channel in &channels {
        log_previous_run(engine.database(), channel)?;
    }

    let controller = Arc::new(SyncController::new(
        Arc::new(engine),
        EventBroadcaster::default(),
    ));
    let stopped = Arc::new(AtomicBool::new(false));
    {
        let controller = Arc::clone(&controller);
        let stopped = Arc::clone(&stopped);
        ctrlc::set_handler(move || {
            stopped.store(true, Ordering::Release);
            controller.stop_sync();
        })
        .context("failed to install Ctrl+C handler")?;
    }

    let mut events = controller.subscribe();
    let total = channels.len();
    let mut handle = controller.sync_all(channels)?;

    let summaries = loop {
        tokio::select! {
            joined = &mut handle => break joined?,
            received = events.recv() => match received {
                Ok(event) => print_controller_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Progress output fell behind, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => {}
            },
        }
    };
    while let Ok(event) = events.try_recv() {
        print_controller_event(&event);
    }

    let stored: usize = summaries.iter().map(|s| s.stored).sum();
    info!(channels = summaries.len(), stored, "Batch run finished");

    let failed = total - summaries.len();
    if failed > 0 && !stopped.load(Ordering::Acquire) {
        anyhow::bail!("{} of {} channels failed to sync", failed, total);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let settings = Settings::from_env().context("invalid configuration")?;
    info!(
        api_id = settings.api_id,
        api_hash = %redact_secret(settings.api_hash.expose_secret()),
        session = %settings.session_path().display(),
        "Loaded platform credentials"
    );

    let db = Database::open(&settings.database_path())?;
    let media = MediaStorage::new(&settings.downloads_dir, &settings.storage_root)?;
    let source = Arc::new(ExportArchiveSource::new(&settings.export_dir));
    let engine = SyncEngine::new(source, db, media);

    if cli.all {
        sync_listed(&settings, engine).await
    } else {
        sync_default(&settings, engine).await
    }
}
