//! # Upload Scheduler
//!
//! Bounded-concurrency pipeline moving local files into storage channels.
//!
//! ## Overview
//!
//! A run proceeds in phases:
//! 1. Claim the single run slot and announce the run
//! 2. Drain a shared FIFO of candidates with `concurrency` workers
//! 3. Report progress every interval while workers are busy
//! 4. Persist the index and publish the final summary once every worker settled
//!
//! Each file is sent to every channel, one pool identity per send. Records are
//! appended only when all channels accepted the file; a failure on any channel
//! fails the attempt and the whole file is retried (see [`crate::retry`]).
//!
//! Deduplication is by relative path across all channels: a file recorded
//! once is not sent again, even to channels registered later.
//!
//! ## Usage
//!
//! ```ignore
//! let scheduler = UploadScheduler::new(config, pool, store, file_system, event_bus, shutdown);
//! let summary = scheduler.run(candidates, registry.snapshot(), 4).await?;
//! println!("{} uploaded, {} failed", summary.uploaded_files, summary.failed_files);
//! ```

use crate::media;
use crate::metadata::{FileRecord, MetadataStore};
use crate::pool::ClientPool;
use crate::progress::UploadStats;
use crate::retry::{FailureClass, RetryPolicy};
use crate::{BackupError, Result};
use bridge_traits::{ChatId, FileSystemAccess, MediaSource, UploadStream};
use core_async::sync::CancellationToken;
use core_async::task::JoinSet;
use core_async::time::{sleep_or_cancel, Instant};
use core_runtime::config::UploadSettings;
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an upload run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadRunId(Uuid);

impl UploadRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Configuration & Results
// ============================================================================

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Root relative paths are computed against
    pub scan_root: PathBuf,

    /// Attempt ceiling and backoff
    pub retry: RetryPolicy,

    /// Interval between progress events
    pub progress_interval: Duration,

    /// Successful files between intermediate saves
    pub flush_every: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            scan_root: PathBuf::from("."),
            retry: RetryPolicy::default(),
            progress_interval: Duration::from_secs(10 * 60),
            flush_every: 10,
        }
    }
}

impl UploadConfig {
    pub fn from_settings(scan_root: impl Into<PathBuf>, settings: &UploadSettings) -> Self {
        Self {
            scan_root: scan_root.into(),
            retry: RetryPolicy::from(settings),
            progress_interval: settings.progress_interval,
            flush_every: settings.flush_every,
        }
    }
}

/// Outcome of a settled run.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSummary {
    pub run_id: UploadRunId,
    pub total_files: u64,
    pub uploaded_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
    pub duration: Duration,
    pub average_rate_per_minute: f64,
    /// Shutdown stopped the run before every candidate was handled.
    pub interrupted: bool,
}

// ============================================================================
// Scheduler
// ============================================================================

pub struct UploadScheduler {
    config: UploadConfig,
    pool: Arc<ClientPool>,
    store: Arc<MetadataStore>,
    file_system: Arc<dyn FileSystemAccess>,
    event_bus: EventBus,
    shutdown: CancellationToken,
    active_run: Mutex<Option<UploadRunId>>,
}

impl UploadScheduler {
    /// Create a scheduler.
    ///
    /// Cancelling `shutdown` stops workers from taking new files and abandons
    /// pending backoff sleeps; in-flight sends finish.
    pub fn new(
        config: UploadConfig,
        pool: Arc<ClientPool>,
        store: Arc<MetadataStore>,
        file_system: Arc<dyn FileSystemAccess>,
        event_bus: EventBus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            pool,
            store,
            file_system,
            event_bus,
            shutdown,
            active_run: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active_run.lock().is_some()
    }

    /// Upload `candidates` to every channel in `channels`.
    ///
    /// Returns once every worker has settled. Per-file failures are counted in
    /// the summary, never returned.
    ///
    /// # Errors
    ///
    /// - [`BackupError::NoChannels`] when `channels` is empty
    /// - [`BackupError::UploadInProgress`] when another run holds the slot
    #[instrument(skip(self, candidates, channels), fields(files = candidates.len(), channels = channels.len()))]
    pub async fn run(
        &self,
        candidates: Vec<PathBuf>,
        channels: Vec<ChatId>,
        concurrency: usize,
    ) -> Result<UploadSummary> {
        if channels.is_empty() {
            return Err(BackupError::NoChannels);
        }

        let run_id = UploadRunId::new();
        let _slot = self.claim_run(run_id)?;
        let concurrency = concurrency.max(1);
        let total_files = candidates.len() as u64;

        // Phase 1: Announce
        info!(run_id = %run_id, total_files, concurrency, "Phase 1: Starting upload run");
        self.event_bus
            .emit(CoreEvent::Upload(UploadEvent::Started {
                run_id: run_id.to_string(),
                total_files,
                channels: channels.len(),
                concurrency,
            }))
            .ok();

        let context = Arc::new(RunContext {
            run_id,
            config: self.config.clone(),
            pool: Arc::clone(&self.pool),
            store: Arc::clone(&self.store),
            file_system: Arc::clone(&self.file_system),
            event_bus: self.event_bus.clone(),
            channels,
            queue: Mutex::new(candidates.into_iter().collect()),
            stats: Mutex::new(UploadStats::new(total_files)),
            cancel: self.shutdown.child_token(),
        });

        // Phase 2: Drain the queue
        info!("Phase 2: Spawning {} upload workers", concurrency);
        let mut workers = JoinSet::new();
        for worker_id in 0..concurrency {
            workers.spawn(Arc::clone(&context).worker(worker_id));
        }

        let reporter_stop = CancellationToken::new();
        let reporter = core_async::spawn(Arc::clone(&context).report_progress(reporter_stop.clone()));

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(run_id = %run_id, error = %e, "Upload worker terminated abnormally");
            }
        }

        reporter_stop.cancel();
        if let Err(e) = reporter.await {
            warn!(error = %e, "Progress reporter terminated abnormally");
        }

        // Phase 3: Persist
        info!("Phase 3: Saving metadata");
        if let Err(e) = self.store.save().await {
            error!(error = %e, "Failed to save metadata after upload run");
        }

        // Phase 4: Summarize
        let summary = context.summary();
        self.event_bus
            .emit(CoreEvent::Upload(UploadEvent::Completed {
                run_id: run_id.to_string(),
                uploaded_files: summary.uploaded_files,
                skipped_files: summary.skipped_files,
                failed_files: summary.failed_files,
                total_files: summary.total_files,
                duration_secs: summary.duration.as_secs(),
                average_rate_per_minute: summary.average_rate_per_minute,
                interrupted: summary.interrupted,
            }))
            .ok();

        info!(
            run_id = %run_id,
            uploaded = summary.uploaded_files,
            skipped = summary.skipped_files,
            failed = summary.failed_files,
            interrupted = summary.interrupted,
            "Phase 4: Upload run settled"
        );

        Ok(summary)
    }

    fn claim_run(&self, run_id: UploadRunId) -> Result<RunSlot<'_>> {
        let mut active = self.active_run.lock();
        if let Some(current) = active.as_ref() {
            return Err(BackupError::UploadInProgress {
                run_id: current.to_string(),
            });
        }
        *active = Some(run_id);
        Ok(RunSlot {
            slot: &self.active_run,
        })
    }
}

/// Releases the run slot when the run future completes or is dropped.
struct RunSlot<'a> {
    slot: &'a Mutex<Option<UploadRunId>>,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

// ============================================================================
// Run internals
// ============================================================================

struct RunContext {
    run_id: UploadRunId,
    config: UploadConfig,
    pool: Arc<ClientPool>,
    store: Arc<MetadataStore>,
    file_system: Arc<dyn FileSystemAccess>,
    event_bus: EventBus,
    channels: Vec<ChatId>,
    queue: Mutex<VecDeque<PathBuf>>,
    stats: Mutex<UploadStats>,
    cancel: CancellationToken,
}

impl RunContext {
    async fn worker(self: Arc<Self>, worker_id: usize) {
        loop {
            if self.cancel.is_cancelled() {
                debug!(worker_id, "Shutdown requested, worker stops taking files");
                break;
            }

            let next = self.queue.lock().pop_front();
            let Some(path) = next else {
                break;
            };

            self.process(&path).await;
        }

        debug!(worker_id, "Upload worker settled");
    }

    async fn process(&self, path: &Path) {
        let relative = media::relative_path(&self.config.scan_root, path);

        if self.store.is_uploaded(&relative) {
            debug!(path = %relative, "Already uploaded, skipping");
            self.stats.lock().record_skipped();
            return;
        }

        let policy = self.config.retry;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match self.upload_once(path, &relative).await {
                Ok(records) => {
                    for record in records {
                        self.store.add(record);
                    }
                    self.on_uploaded(&relative, attempt).await;
                    return;
                }
                Err(e) => e,
            };

            let class = FailureClass::classify(&error);

            if !policy.has_attempts_left(attempt) {
                error!(
                    path = %relative,
                    attempts = attempt,
                    class = class.as_str(),
                    error = %error,
                    "Upload failed after final attempt"
                );
                self.stats.lock().record_failed();
                self.event_bus
                    .emit(CoreEvent::Upload(UploadEvent::FileFailed {
                        run_id: self.run_id.to_string(),
                        relative_path: relative,
                        attempts: attempt,
                        message: error.to_string(),
                    }))
                    .ok();
                return;
            }

            let delay = policy.delay_for(&class, attempt);
            warn!(
                path = %relative,
                attempt,
                class = class.as_str(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Upload attempt failed, retrying"
            );

            if !delay.is_zero() && !sleep_or_cancel(delay, &self.cancel).await {
                warn!(path = %relative, attempt, "Backoff abandoned by shutdown");
                return;
            }
        }
    }

    async fn upload_once(&self, path: &Path, relative: &str) -> Result<Vec<FileRecord>> {
        let metadata = self.file_system.metadata(path).await?;
        let caption = media::caption(relative, metadata.modified_at);
        let kind = media::classify(path);
        let file_name = media::upload_name(path);

        let mut records = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let identity = self.pool.next();
            let reader = self.file_system.open_read_stream(path).await?;
            let source =
                MediaSource::Upload(UploadStream::new(file_name.clone(), metadata.size, reader));

            let remote_object_id = identity
                .transport()
                .send_media(kind, channel, source, Some(&caption))
                .await?;

            debug!(
                path = %relative,
                channel = %channel,
                identity = identity.label(),
                kind = kind.as_str(),
                "Sent to channel"
            );

            records.push(FileRecord {
                relative_path: relative.to_string(),
                remote_object_id,
                caption: caption.clone(),
                channel_id: channel.clone(),
            });
        }

        Ok(records)
    }

    async fn on_uploaded(&self, relative: &str, attempt: u32) {
        let flush = {
            let mut stats = self.stats.lock();
            stats.record_uploaded();
            stats.uploaded_files % self.config.flush_every.max(1) as u64 == 0
        };

        info!(path = %relative, attempt, "File uploaded");

        if flush {
            if let Err(e) = self.store.save().await {
                warn!(error = %e, "Intermediate metadata save failed");
            }
        }
    }

    async fn report_progress(self: Arc<Self>, stop: CancellationToken) {
        while sleep_or_cancel(self.config.progress_interval, &stop).await {
            let snapshot = self.stats.lock().take_snapshot(Instant::now());

            info!(
                run_id = %self.run_id,
                uploaded = snapshot.uploaded_files,
                skipped = snapshot.skipped_files,
                total = snapshot.total_files,
                percent = snapshot.percent,
                rate_per_minute = snapshot.rate_per_minute,
                "Upload progress"
            );

            self.event_bus
                .emit(CoreEvent::Upload(UploadEvent::Progress {
                    run_id: self.run_id.to_string(),
                    uploaded_files: snapshot.uploaded_files,
                    skipped_files: snapshot.skipped_files,
                    failed_files: snapshot.failed_files,
                    total_files: snapshot.total_files,
                    percent: snapshot.percent,
                    elapsed_secs: snapshot.elapsed.as_secs(),
                    rate_per_minute: snapshot.rate_per_minute,
                    eta_secs: snapshot.eta.map(|eta| eta.as_secs()),
                }))
                .ok();
        }
    }

    fn summary(&self) -> UploadSummary {
        let now = Instant::now();
        let stats = self.stats.lock();

        UploadSummary {
            run_id: self.run_id,
            total_files: stats.total_files,
            uploaded_files: stats.uploaded_files,
            skipped_files: stats.skipped_files,
            failed_files: stats.failed_files,
            duration: now.saturating_duration_since(stats.start_time),
            average_rate_per_minute: stats.average_rate_per_minute(now),
            interrupted: self.cancel.is_cancelled() && stats.remaining() > 0,
        }
    }
}
