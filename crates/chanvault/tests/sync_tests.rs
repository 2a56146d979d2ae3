//! Integration tests for the sync engine against a scripted history source.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chanvault::db::message_repo;
use chanvault::sync::{NoopReporter, SyncEvent};
use chanvault::{MessageRecord, SyncError};
use common::*;

const CHANNEL: &str = "https://t.me/rustnews";
const COLLECTION: &str = "rustnews";

fn running() -> AtomicBool {
    AtomicBool::new(true)
}

fn records(ids: impl IntoIterator<Item = i64>) -> Vec<MessageRecord> {
    ids.into_iter()
        .map(|id| MessageRecord::from_message(&post(id)))
        .collect()
}

#[test]
fn test_highest_id_of_empty_collection_is_zero() {
    let env = TestEnv::new();
    assert_eq!(env.db.highest_id(COLLECTION).unwrap(), 0);

    env.db.insert_batch(COLLECTION, CHANNEL, &[]).unwrap();
    assert_eq!(env.db.highest_id(COLLECTION).unwrap(), 0);
}

#[test]
fn test_highest_id_after_insert_is_max() {
    let env = TestEnv::new();
    env.db
        .insert_batch(COLLECTION, CHANNEL, &records([7, 3, 42, 12]))
        .unwrap();

    assert_eq!(env.db.highest_id(COLLECTION).unwrap(), 42);
}

#[test]
fn test_duplicates_in_batch_do_not_abort_the_rest() {
    let env = TestEnv::new();
    env.db
        .insert_batch(COLLECTION, CHANNEL, &records([2, 4]))
        .unwrap();

    let summary = env
        .db
        .insert_batch(COLLECTION, CHANNEL, &records([1, 2, 3, 4, 5]))
        .unwrap();

    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.duplicates, 2);
    assert_eq!(
        message_repo::find_ids(&env.db, COLLECTION).unwrap(),
        vec![1, 2, 3, 4, 5]
    );
}

#[tokio::test]
async fn test_first_sync_stores_all_posts() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 30)));
    let engine = env.engine(source.clone());

    let summary = engine.sync(CHANNEL, &running(), &NoopReporter).await.unwrap();

    assert_eq!(summary.collection, COLLECTION);
    assert_eq!(summary.min_id, 0);
    assert_eq!(summary.stored, 30);
    assert_eq!(summary.last_id, Some(30));
    assert!(!summary.cancelled);
    assert_eq!(source.requested_min_ids(), vec![0]);
    assert_eq!(message_repo::count(&env.db, COLLECTION).unwrap(), 30);
}

#[tokio::test]
async fn test_second_sync_without_new_posts_stores_nothing() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 25)));
    let engine = env.engine(source.clone());

    engine.sync(CHANNEL, &running(), &NoopReporter).await.unwrap();
    let second = engine.sync(CHANNEL, &running(), &NoopReporter).await.unwrap();

    assert_eq!(second.stored, 0);
    assert_eq!(second.batches, 0);
    assert_eq!(source.requested_min_ids(), vec![0, 25]);
    assert_eq!(message_repo::count(&env.db, COLLECTION).unwrap(), 25);
}

#[tokio::test]
async fn test_resumes_after_highest_stored_id() {
    let env = TestEnv::new();
    env.db
        .insert_batch(COLLECTION, CHANNEL, &records(1..=50))
        .unwrap();

    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 80)));
    let engine = env.engine(source.clone());
    let summary = engine.sync(CHANNEL, &running(), &NoopReporter).await.unwrap();

    assert_eq!(summary.min_id, 50);
    assert_eq!(summary.stored, 30);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(source.requested_min_ids(), vec![50]);
    assert_eq!(env.db.highest_id(COLLECTION).unwrap(), 80);
    assert_eq!(
        message_repo::find_ids(&env.db, COLLECTION).unwrap(),
        (1..=80).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_source_replaying_old_posts_counts_duplicates() {
    let env = TestEnv::new();
    env.db
        .insert_batch(COLLECTION, CHANNEL, &records(1..=10))
        .unwrap();

    let source = Arc::new(
        ScriptedSource::new()
            .channel(COLLECTION, posts(1, 15))
            .ignoring_min_id(),
    );
    let summary = env
        .engine(source)
        .sync(CHANNEL, &running(), &NoopReporter)
        .await
        .unwrap();

    assert_eq!(summary.stored, 5);
    assert_eq!(summary.duplicates, 10);
    assert_eq!(message_repo::count(&env.db, COLLECTION).unwrap(), 15);
}

#[tokio::test]
async fn test_service_events_are_skipped() {
    let env = TestEnv::new();
    let history = vec![post(1), service(2), post(3), service(4)];
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, history));

    let summary = env
        .engine(source)
        .sync(CHANNEL, &running(), &NoopReporter)
        .await
        .unwrap();

    assert_eq!(summary.stored, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(
        message_repo::find_ids(&env.db, COLLECTION).unwrap(),
        vec![1, 3]
    );
}

#[tokio::test]
async fn test_media_failure_keeps_message() {
    let env = TestEnv::new();
    let history = vec![post_with_media(1), post_with_media(2), post(3)];
    let source = Arc::new(
        ScriptedSource::new()
            .channel(COLLECTION, history)
            .failing_download(2),
    );
    let reporter = RecordingReporter::new();

    let summary = env
        .engine(source.clone())
        .sync(CHANNEL, &running(), &reporter)
        .await
        .unwrap();

    assert_eq!(summary.stored, 3);
    assert_eq!(summary.media_saved, 1);
    assert_eq!(summary.media_failures, 1);
    assert_eq!(source.downloads(), 2);

    let saved = message_repo::find_by_id(&env.db, COLLECTION, 1)
        .unwrap()
        .unwrap();
    assert_eq!(
        saved.saved_media_path.as_deref(),
        Some("downloads/rustnews-1/photo_1.jpg")
    );
    assert!(env.root().join("downloads/rustnews-1/photo_1.jpg").exists());

    let failed = message_repo::find_by_id(&env.db, COLLECTION, 2)
        .unwrap()
        .unwrap();
    assert_eq!(failed.saved_media_path, None);
    assert_eq!(failed.document["text"], "post 2");
    assert!(failed.document.get("saved_media_path").is_none());

    assert!(reporter
        .events()
        .iter()
        .any(|e| matches!(e, SyncEvent::MediaFailed { message_id: 2, .. })));
}

#[tokio::test]
async fn test_document_keeps_platform_fields() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, vec![post_with_media(9)]));

    env.engine(source)
        .sync(CHANNEL, &running(), &NoopReporter)
        .await
        .unwrap();

    let stored = message_repo::find_by_id(&env.db, COLLECTION, 9)
        .unwrap()
        .unwrap();
    assert_eq!(stored.document["_id"], 9);
    assert_eq!(stored.document["type"], "message");
    assert_eq!(stored.document["text"], "post 9");
    assert_eq!(
        stored.document["saved_media_path"],
        "downloads/rustnews-9/photo_9.jpg"
    );
    assert_eq!(stored.date.as_deref(), Some("2026-03-01T00:09:00"));
}

#[tokio::test]
async fn test_exactly_one_hundred_flushes_immediately() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 101)));
    let reporter = RecordingReporter::new();

    let summary = env
        .engine(source)
        .sync(CHANNEL, &running(), &reporter)
        .await
        .unwrap();

    assert_eq!(summary.stored, 101);
    assert_eq!(summary.batches, 2);
    assert_eq!(reporter.flush_sizes(), vec![100, 1]);
    // The first flush lands before message 101 is processed.
    assert_eq!(reporter.processed_before_flushes(), vec![100, 101]);
}

#[tokio::test]
async fn test_ninety_nine_posts_flush_once_at_end() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 99)));
    let reporter = RecordingReporter::new();

    let summary = env
        .engine(source)
        .sync(CHANNEL, &running(), &reporter)
        .await
        .unwrap();

    assert_eq!(summary.batches, 1);
    assert_eq!(reporter.flush_sizes(), vec![99]);
    assert_eq!(reporter.processed_before_flushes(), vec![99]);
}

#[tokio::test]
async fn test_cancellation_flushes_partial_batch() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 250)));
    let flag = Arc::new(AtomicBool::new(true));
    let reporter = RecordingReporter::stopping_after(130, flag.clone());

    let summary = env
        .engine(source)
        .sync(CHANNEL, &flag, &reporter)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.stored, 130);
    assert_eq!(reporter.flush_sizes(), vec![100, 30]);
    assert!(reporter
        .events()
        .iter()
        .any(|e| matches!(e, SyncEvent::Stopped)));
    assert_eq!(env.db.highest_id(COLLECTION).unwrap(), 130);
}

#[tokio::test]
async fn test_resume_after_cancellation_picks_up_remaining_posts() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 60)));
    let engine = env.engine(source.clone());

    let flag = Arc::new(AtomicBool::new(true));
    let reporter = RecordingReporter::stopping_after(20, flag.clone());
    engine.sync(CHANNEL, &flag, &reporter).await.unwrap();

    let summary = engine.sync(CHANNEL, &running(), &NoopReporter).await.unwrap();

    assert_eq!(summary.min_id, 20);
    assert_eq!(summary.stored, 40);
    assert_eq!(message_repo::count(&env.db, COLLECTION).unwrap(), 60);
}

#[tokio::test]
async fn test_stream_error_keeps_flushed_batches() {
    let env = TestEnv::new();
    let source = Arc::new(
        ScriptedSource::new()
            .channel(COLLECTION, posts(1, 150))
            .fail_at(120),
    );

    let err = env
        .engine(source)
        .sync(CHANNEL, &running(), &NoopReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Source(_)));
    assert_eq!(env.db.highest_id(COLLECTION).unwrap(), 100);
}

#[tokio::test]
async fn test_unknown_channel_is_an_error() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 3)));

    let err = env
        .engine(source)
        .sync("https://t.me/elsewhere", &running(), &NoopReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Source(_)));
    assert!(!message_repo::collection_exists(&env.db, "elsewhere").unwrap());
}

#[tokio::test]
async fn test_overlapping_runs_do_not_corrupt_collection() {
    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 120)));
    let first = env.engine(source.clone());
    let second = env.engine(source);
    let (flag_a, flag_b) = (running(), running());

    let (a, b) = tokio::join!(
        first.sync(CHANNEL, &flag_a, &NoopReporter),
        second.sync(CHANNEL, &flag_b, &NoopReporter),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.stored + b.stored, 120);
    assert_eq!(
        message_repo::find_ids(&env.db, COLLECTION).unwrap(),
        (1..=120).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_collections_are_registered_per_channel() {
    let env = TestEnv::new();
    let source = Arc::new(
        ScriptedSource::new()
            .channel("alpha", posts(1, 2))
            .channel("beta", posts(1, 3)),
    );
    let engine = env.engine(source);

    engine
        .sync("https://t.me/alpha/", &running(), &NoopReporter)
        .await
        .unwrap();
    engine.sync("beta", &running(), &NoopReporter).await.unwrap();

    let names: Vec<_> = message_repo::list_collections(&env.db)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(message_repo::count(&env.db, "beta").unwrap(), 3);
}

#[tokio::test]
async fn test_each_run_is_recorded() {
    use chanvault::db::run_repo;

    let env = TestEnv::new();
    let source = Arc::new(ScriptedSource::new().channel(COLLECTION, posts(1, 40)));
    let engine = env.engine(source);

    let flag = Arc::new(AtomicBool::new(true));
    let reporter = RecordingReporter::stopping_after(15, flag.clone());
    engine.sync(CHANNEL, &flag, &reporter).await.unwrap();

    let first = run_repo::last_run(&env.db, COLLECTION).unwrap().unwrap();
    assert!(first.cancelled);
    assert_eq!(first.stored, 15);
    assert_eq!(first.last_id, Some(15));

    engine.sync(CHANNEL, &running(), &NoopReporter).await.unwrap();
    let second = run_repo::last_run(&env.db, COLLECTION).unwrap().unwrap();
    assert!(!second.cancelled);
    assert_eq!(second.min_id, 15);
    assert_eq!(second.stored, 25);
    assert_eq!(run_repo::recent_runs(&env.db, 10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_channel_case_variants_share_resume_cursor() {
    let env = TestEnv::new();
    let source = Arc::new(
        ScriptedSource::new()
            .channel("RustNews", posts(1, 50))
            .channel("rustnews", posts(1, 80)),
    );
    let engine = env.engine(source.clone());

    let first = engine
        .sync("https://t.me/RustNews", &running(), &NoopReporter)
        .await
        .unwrap();
    assert_eq!(first.stored, 50);
    assert_eq!(env.db.highest_id("rustnews").unwrap(), 50);

    let second = engine.sync("rustnews", &running(), &NoopReporter).await.unwrap();
    assert_eq!(second.min_id, 50);
    assert_eq!(second.stored, 30);
    assert_eq!(second.duplicates, 0);
    assert_eq!(source.requested_min_ids(), vec![0, 50]);
    assert_eq!(message_repo::count(&env.db, "RustNews").unwrap(), 80);
    assert_eq!(message_repo::list_collections(&env.db).unwrap().len(), 1);
}
