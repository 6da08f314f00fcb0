//! Upload scheduler scenarios against fake transports and an in-memory drive.

mod common;

use bridge_traits::{ChatId, ChatTransport, FileSystemAccess, MediaKind};
use common::{FailMode, FakeRemote, FakeTransport, MemoryFileSystem};
use core_async::sync::CancellationToken;
use core_backup::{
    BackupError, ClientPool, MetadataStore, RetryPolicy, UploadConfig, UploadScheduler,
};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    remote: Arc<FakeRemote>,
    store: Arc<MetadataStore>,
    scheduler: Arc<UploadScheduler>,
    event_bus: EventBus,
    shutdown: CancellationToken,
    _dir: TempDir,
}

fn drive() -> Arc<MemoryFileSystem> {
    MemoryFileSystem::with_files(&[
        ("/drive/2021/a.jpg", b"jpeg bytes"),
        ("/drive/b.mp4", b"video bytes"),
        ("/drive/notes/c.txt", b"text bytes"),
    ])
}

fn config() -> UploadConfig {
    UploadConfig {
        scan_root: PathBuf::from("/drive"),
        ..UploadConfig::default()
    }
}

fn harness(fs: Arc<MemoryFileSystem>, bots: usize, config: UploadConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let remote = FakeRemote::new();
    let transports = (0..bots)
        .map(|i| FakeTransport::new(&format!("bot{}", i), &remote) as Arc<dyn ChatTransport>)
        .collect();
    let pool = Arc::new(ClientPool::new(transports).unwrap());
    let store = Arc::new(MetadataStore::new(dir.path().join("index.tcsnap")));
    let event_bus = EventBus::default();
    let shutdown = CancellationToken::new();

    let scheduler = Arc::new(UploadScheduler::new(
        config,
        pool,
        Arc::clone(&store),
        fs as Arc<dyn FileSystemAccess>,
        event_bus.clone(),
        shutdown.clone(),
    ));

    Harness {
        remote,
        store,
        scheduler,
        event_bus,
        shutdown,
        _dir: dir,
    }
}

fn candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/drive/2021/a.jpg"),
        PathBuf::from("/drive/b.mp4"),
        PathBuf::from("/drive/notes/c.txt"),
    ]
}

fn channels(ids: &[&str]) -> Vec<ChatId> {
    ids.iter().map(|id| ChatId::from(*id)).collect()
}

#[tokio::test]
async fn test_uploads_every_file_to_every_channel() {
    let h = harness(drive(), 2, config());

    let summary = h
        .scheduler
        .run(candidates(), channels(&["-1", "-2"]), 2)
        .await
        .unwrap();

    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.uploaded_files, 3);
    assert_eq!(summary.failed_files, 0);
    assert!(!summary.interrupted);
    assert_eq!(h.store.len(), 6);
    assert_eq!(h.remote.successful_sends(), 6);

    let a = h.remote.attempts_for("a.jpg");
    assert_eq!(a[0].kind, MediaKind::Photo);
    assert_eq!(
        a[0].caption.as_deref(),
        Some("Path: 2021/a.jpg\nDate: 4/3/2021")
    );
    assert_eq!(h.remote.attempts_for("b.mp4")[0].kind, MediaKind::Video);
    assert_eq!(h.remote.attempts_for("c.txt")[0].kind, MediaKind::Document);
    assert!(h.store.is_uploaded("notes/c.txt"));
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let h = harness(drive(), 1, config());
    let targets = channels(&["-1"]);

    h.scheduler.run(candidates(), targets.clone(), 2).await.unwrap();
    let sends_after_first = h.remote.attempts().len();
    let records_after_first = h.store.len();

    let summary = h.scheduler.run(candidates(), targets, 2).await.unwrap();

    assert_eq!(summary.uploaded_files, 0);
    assert_eq!(summary.skipped_files, 3);
    assert_eq!(h.remote.attempts().len(), sends_after_first);
    assert_eq!(h.store.len(), records_after_first);
}

#[tokio::test]
async fn test_round_robin_spreads_sends() {
    let fs = MemoryFileSystem::with_files(&[
        ("/drive/1.jpg", b"1"),
        ("/drive/2.jpg", b"2"),
        ("/drive/3.jpg", b"3"),
        ("/drive/4.jpg", b"4"),
    ]);
    let h = harness(Arc::clone(&fs), 2, config());

    h.scheduler
        .run(fs.paths(), channels(&["-1"]), 1)
        .await
        .unwrap();

    let attempts = h.remote.attempts();
    let bot0 = attempts.iter().filter(|a| a.identity == "bot0").count();
    let bot1 = attempts.iter().filter(|a| a.identity == "bot1").count();
    assert_eq!((bot0, bot1), (2, 2));
}

#[tokio::test]
async fn test_failing_file_does_not_block_the_run() {
    let h = harness(drive(), 1, config());
    h.remote.fail("b.mp4", None, FailMode::Api(400));

    let summary = h
        .scheduler
        .run(candidates(), channels(&["-1"]), 1)
        .await
        .unwrap();

    assert_eq!(summary.uploaded_files, 2);
    assert_eq!(summary.failed_files, 1);
    assert_eq!(h.remote.attempts_for("b.mp4").len(), 5);
    assert!(!h.store.is_uploaded("b.mp4"));
    assert!(h.store.is_uploaded("2021/a.jpg"));
}

#[tokio::test]
async fn test_partial_channel_failure_records_nothing() {
    let h = harness(drive(), 1, config());
    h.remote.fail_destination("b.mp4", "-2", FailMode::Api(403));

    let summary = h
        .scheduler
        .run(candidates(), channels(&["-1", "-2"]), 1)
        .await
        .unwrap();

    assert_eq!(summary.failed_files, 1);
    assert!(!h.store.is_uploaded("b.mp4"));
    assert!(h.store.list().iter().all(|r| r.relative_path != "b.mp4"));
    assert_eq!(h.store.len(), 4);
}

#[tokio::test]
async fn test_payload_is_streamed_for_every_send() {
    let fs = drive();
    let h = harness(Arc::clone(&fs), 1, config());
    h.remote.fail("a.jpg", Some(1), FailMode::Api(400));

    let summary = h
        .scheduler
        .run(candidates(), channels(&["-1", "-2"]), 1)
        .await
        .unwrap();

    assert_eq!(summary.uploaded_files, 3);
    // a.jpg: one failed send, then both channels again; the others once per channel.
    assert_eq!(fs.streams_opened(), 1 + 2 + 2 + 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_hint_is_honored() {
    let h = harness(drive(), 1, config());
    h.remote.fail(
        "a.jpg",
        Some(1),
        FailMode::RateLimited(Some(Duration::from_millis(5000))),
    );

    let summary = h
        .scheduler
        .run(vec![PathBuf::from("/drive/2021/a.jpg")], channels(&["-1"]), 1)
        .await
        .unwrap();

    assert_eq!(summary.uploaded_files, 1);
    let attempts = h.remote.attempts_for("a.jpg");
    assert_eq!(attempts.len(), 2);
    let gap = attempts[1].at.duration_since(attempts[0].at);
    assert!(gap >= Duration::from_millis(5000), "retried after {:?}", gap);
    assert!(gap < Duration::from_secs(10), "backoff used instead of hint: {:?}", gap);
}

#[tokio::test(start_paused = true)]
async fn test_network_failures_stop_after_five_attempts() {
    let h = harness(drive(), 1, config());
    h.remote.fail("a.jpg", None, FailMode::Network);

    let summary = h
        .scheduler
        .run(vec![PathBuf::from("/drive/2021/a.jpg")], channels(&["-1"]), 1)
        .await
        .unwrap();

    assert_eq!(summary.failed_files, 1);
    let attempts = h.remote.attempts_for("a.jpg");
    assert_eq!(attempts.len(), 5);

    let gaps: Vec<Duration> = attempts
        .windows(2)
        .map(|pair| pair[1].at.duration_since(pair[0].at))
        .collect();
    let expected = [10, 20, 30, 30];
    for (gap, secs) in gaps.iter().zip(expected) {
        assert!(*gap >= Duration::from_secs(secs), "gap {:?} < {}s", gap, secs);
    }
}

#[tokio::test]
async fn test_custom_attempt_ceiling() {
    let config = UploadConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        },
        ..config()
    };
    let h = harness(drive(), 1, config);
    h.remote.fail("c.txt", None, FailMode::Api(400));

    h.scheduler
        .run(candidates(), channels(&["-1"]), 3)
        .await
        .unwrap();

    assert_eq!(h.remote.attempts_for("c.txt").len(), 2);
}

#[tokio::test]
async fn test_no_channels_is_rejected() {
    let h = harness(drive(), 1, config());

    let result = h.scheduler.run(candidates(), Vec::new(), 1).await;

    assert!(matches!(result, Err(BackupError::NoChannels)));
    assert!(h.remote.attempts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_only_one_run_at_a_time() {
    let h = harness(drive(), 1, config());
    h.remote.set_send_delay(Duration::from_secs(60));

    let scheduler = Arc::clone(&h.scheduler);
    let first = tokio::spawn(async move {
        scheduler.run(candidates(), channels(&["-1"]), 1).await
    });

    while !h.scheduler.is_running() {
        tokio::task::yield_now().await;
    }

    let second = h.scheduler.run(candidates(), channels(&["-1"]), 1).await;
    assert!(matches!(second, Err(BackupError::UploadInProgress { .. })));

    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.uploaded_files, 3);
    assert!(!h.scheduler.is_running());
}

#[tokio::test]
async fn test_shutdown_stops_admission() {
    let h = harness(drive(), 1, config());
    h.shutdown.cancel();

    let summary = h
        .scheduler
        .run(candidates(), channels(&["-1"]), 2)
        .await
        .unwrap();

    assert_eq!(summary.uploaded_files, 0);
    assert!(summary.interrupted);
    assert!(h.remote.attempts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_progress_and_completion_events() {
    let config = UploadConfig {
        progress_interval: Duration::from_secs(60),
        ..config()
    };
    let h = harness(drive(), 1, config);
    h.remote.set_send_delay(Duration::from_secs(50));
    let mut events = h.event_bus.subscribe();

    h.scheduler
        .run(candidates(), channels(&["-1"]), 1)
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert!(matches!(
        received.first(),
        Some(CoreEvent::Upload(UploadEvent::Started { total_files: 3, .. }))
    ));
    let progress: Vec<_> = received
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Upload(UploadEvent::Progress { uploaded_files, .. }) => Some(*uploaded_files),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2]);
    assert!(matches!(
        received.last(),
        Some(CoreEvent::Upload(UploadEvent::Completed {
            uploaded_files: 3,
            interrupted: false,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_run_persists_index() {
    let h = harness(drive(), 1, config());

    h.scheduler
        .run(candidates(), channels(&["-1"]), 2)
        .await
        .unwrap();

    let reloaded = MetadataStore::new(h.store.path());
    assert_eq!(reloaded.load().await, 3);
    assert!(reloaded.is_uploaded("b.mp4"));
}
