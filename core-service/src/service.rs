//! # TeleCloud Service
//!
//! Wires the backup engine, the conversation state machine and the chat
//! transports into one long-running service.
//!
//! ## Overview
//!
//! - One long-poll loop per bot identity feeds [`TeleCloudService::handle_event`]
//! - Events from sessions outside the authorized list are dropped
//! - Forwards and text go through the state machine; the reply is sent back
//!   through the identity that received the event
//! - Bare attachments are re-sent to every storage channel
//! - Upload and restore jobs run in the background and acknowledge the
//!   requesting session when they settle
//! - A relay task turns run events into reports for the admin chat
//!
//! ## Shutdown
//!
//! [`TeleCloudService::shutdown`] stops admission (pollers exit, upload
//! workers stop taking files), waits for background jobs up to a deadline,
//! then saves the metadata store whatever happened before.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::error::BridgeError;
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::transport::{Attachment, ChatId, ChatTransport, InboundEvent, MediaSource, TextOptions};
use core_async::sync::CancellationToken;
use core_async::task::{JoinHandle, TaskTracker};
use core_async::time::{sleep_or_cancel, timeout};
use core_backup::{
    BackupError, ChannelRegistry, ClientIdentity, ClientPool, LocalScanner, MetadataStore,
    RestoreEngine, RestoreSummary, UploadConfig, UploadScheduler, UploadSummary,
};
use core_conversation::{ConversationStateMachine, InMemorySessionTable, SessionAction};
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    ChannelEvent, CoreEvent, EventBus, EventStream, RecvError, UploadEvent,
    DEFAULT_EVENT_BUFFER_SIZE,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, ServiceError};
use crate::reports;

pub const NO_CHANNELS_TEXT: &str = "⚠️ No storage channels registered yet.";
pub const FORWARDED_TEXT: &str = "📤 File sent to cloud storage channel(s).";
pub const FORWARD_FAILED_TEXT: &str = "❌ Failed to forward file.";
pub const UPLOAD_DONE_TEXT: &str = "✅ Upload complete.";
pub const UPLOAD_INTERRUPTED_TEXT: &str = "⏹️ Upload interrupted by shutdown.";
pub const UPLOAD_FAILED_TEXT: &str = "❌ Upload failed.";
pub const RESTORE_DONE_TEXT: &str = "✅ Restore complete.";
pub const RESTORE_INTERRUPTED_TEXT: &str = "⏹️ Restore interrupted by shutdown.";
pub const RESTORE_FAILED_TEXT: &str = "❌ Restore failed.";

/// Pause after a failed poll before trying again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Time the report relay gets to flush the last reports during shutdown
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bridge handles the service is built from.
pub struct ServiceDependencies {
    /// One transport per bot identity, in configuration order
    pub transports: Vec<Arc<dyn ChatTransport>>,
    pub file_system: Arc<dyn FileSystemAccess>,
}

/// Outcome of [`TeleCloudService::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every background job finished before the deadline
    pub drained: bool,
    /// Records written by the final save, `None` when the save failed
    pub saved_records: Option<usize>,
}

/// Primary façade of the backup engine.
#[derive(Clone)]
pub struct TeleCloudService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: CoreConfig,
    pool: Arc<ClientPool>,
    registry: Arc<ChannelRegistry>,
    store: Arc<MetadataStore>,
    scanner: LocalScanner,
    scheduler: UploadScheduler,
    restorer: RestoreEngine,
    machine: ConversationStateMachine,
    event_bus: EventBus,
    authorized: HashSet<ChatId>,
    shutdown: CancellationToken,
    relay_stop: CancellationToken,
    tasks: TaskTracker,
    relay: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    restore_running: AtomicBool,
}

impl TeleCloudService {
    /// Build the service from a validated configuration and bridge handles.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or `deps.transports` is empty.
    pub fn new(config: CoreConfig, deps: ServiceDependencies) -> Result<Self> {
        config.validate()?;

        let pool = Arc::new(ClientPool::new(deps.transports)?);
        let registry = Arc::new(ChannelRegistry::new(
            config.storage_channels.iter().cloned(),
        ));
        let store = Arc::new(MetadataStore::new(config.snapshot_path.clone()));
        let event_bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
        let shutdown = CancellationToken::new();

        let scanner = LocalScanner::new(Arc::clone(&deps.file_system), &config.scan_extensions);
        let scheduler = UploadScheduler::new(
            UploadConfig::from_settings(config.scan_root.clone(), &config.upload),
            Arc::clone(&pool),
            Arc::clone(&store),
            Arc::clone(&deps.file_system),
            event_bus.clone(),
            shutdown.clone(),
        );
        let restorer = RestoreEngine::new(
            config.restore_root.clone(),
            Arc::clone(&pool),
            Arc::clone(&store),
            Arc::clone(&deps.file_system),
            event_bus.clone(),
            shutdown.clone(),
        );
        let machine = ConversationStateMachine::new(
            Arc::new(InMemorySessionTable::new()),
            Arc::clone(&registry),
        );
        let authorized = config.authorized_sessions.iter().cloned().collect();

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                pool,
                registry,
                store,
                scanner,
                scheduler,
                restorer,
                machine,
                event_bus,
                authorized,
                shutdown,
                relay_stop: CancellationToken::new(),
                tasks: TaskTracker::new(),
                relay: Mutex::new(None),
                started: AtomicBool::new(false),
                restore_running: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &Arc<ClientPool> {
        &self.inner.pool
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.inner.registry
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.inner.store
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Load the index, probe identities, then start pollers and the report relay.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(ServiceError::ShuttingDown);
        }
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyStarted);
        }

        info!("Phase 1: Loading metadata from {}", inner.store.path().display());
        let records = inner.store.load().await;

        info!("Phase 2: Probing {} bot identities", inner.pool.len());
        let live = inner.pool.probe_all().await;
        if live == 0 {
            warn!("No identity passed verification, continuing with all identities");
        }

        info!("Phase 3: Starting report relay and pollers");
        let stream = EventStream::new(inner.event_bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Upload(_) | CoreEvent::Restore(_)));
        let relay = core_async::spawn(Arc::clone(inner).relay_reports(stream));
        *inner.relay.lock() = Some(relay);

        for identity in inner.pool.identities() {
            inner
                .tasks
                .spawn(Arc::clone(inner).poll_loop(Arc::clone(identity)));
        }

        info!(
            records,
            live,
            identities = inner.pool.len(),
            channels = inner.registry.len(),
            "TeleCloud service started"
        );
        Ok(())
    }

    /// Route one inbound event received by `identity`.
    pub async fn handle_event(&self, identity: &Arc<ClientIdentity>, event: InboundEvent) {
        self.inner.handle_event(identity, event).await;
    }

    /// Scan the drive and upload everything not yet recorded.
    pub async fn run_upload(&self) -> Result<UploadSummary> {
        self.inner.run_upload().await
    }

    /// Restore every recorded path under the restore root.
    pub async fn run_restore(&self) -> Result<RestoreSummary> {
        self.inner.run_restore().await
    }

    /// Stop admission, wait up to `deadline` for background jobs, then save.
    #[instrument(skip(self), fields(deadline_ms = deadline.as_millis() as u64))]
    pub async fn shutdown(&self, deadline: Duration) -> ShutdownReport {
        let inner = &self.inner;

        info!("Phase 1: Cancelling admission");
        inner.shutdown.cancel();
        inner.tasks.close();

        info!("Phase 2: Waiting for {} background tasks", inner.tasks.len());
        let drained = timeout(deadline, inner.tasks.wait()).await.is_ok();
        if !drained {
            warn!(
                pending = inner.tasks.len(),
                "Background tasks still running at the shutdown deadline"
            );
        }

        inner.relay_stop.cancel();
        let relay = inner.relay.lock().take();
        if let Some(relay) = relay {
            match timeout(RELAY_DRAIN_TIMEOUT, relay).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Report relay terminated abnormally"),
                Err(_) => warn!("Report relay did not drain in time"),
            }
        }

        info!("Phase 3: Saving metadata");
        let saved_records = match inner.store.save().await {
            Ok(count) => Some(count),
            Err(e) => {
                error!(error = %e, "Failed to save metadata during shutdown");
                None
            }
        };

        info!(drained, saved = ?saved_records, "Shutdown complete");
        ShutdownReport {
            drained,
            saved_records,
        }
    }
}

impl ServiceInner {
    async fn poll_loop(self: Arc<Self>, identity: Arc<ClientIdentity>) {
        debug!(identity = %identity.label(), "Poller started");
        let poll_timeout = self.config.poll_timeout;

        loop {
            let polled = match self
                .shutdown
                .run_until_cancelled(identity.transport().poll_events(poll_timeout))
                .await
            {
                Some(polled) => polled,
                None => break,
            };

            match polled {
                Ok(events) => {
                    for event in events {
                        self.handle_event(&identity, event).await;
                    }
                }
                Err(e) => {
                    let delay = match &e {
                        BridgeError::RateLimited {
                            retry_after: Some(hint),
                        } => *hint,
                        _ => POLL_RETRY_DELAY,
                    };
                    warn!(identity = %identity.label(), error = %e, "Polling failed");
                    if !sleep_or_cancel(delay, &self.shutdown).await {
                        break;
                    }
                }
            }
        }

        debug!(identity = %identity.label(), "Poller stopped");
    }

    async fn handle_event(self: &Arc<Self>, identity: &Arc<ClientIdentity>, event: InboundEvent) {
        if !self.authorized.contains(&event.session) {
            debug!(session = %event.session, "Ignoring event from unauthorized session");
            return;
        }

        let session = event.session.clone();
        let transition = if event.forwarded {
            self.machine
                .handle_forward(&session, event.forwarded_from_channel.as_ref())
        } else if let Some(text) = event.text.as_deref() {
            self.machine.handle_text(&session, text)
        } else if let Some(attachment) = event.attachment {
            self.forward_attachment(identity, &session, attachment).await;
            return;
        } else {
            debug!(session = %session, "Ignoring event without text or attachment");
            return;
        };

        self.reply(
            identity,
            &session,
            &transition.response.text,
            transition.response.options(),
        )
        .await;

        if let Some(action) = transition.action {
            self.dispatch(identity, session, action);
        }
    }

    fn dispatch(self: &Arc<Self>, identity: &Arc<ClientIdentity>, session: ChatId, action: SessionAction) {
        match action {
            SessionAction::ChannelRegistered {
                channel,
                newly_added,
            } => {
                info!(channel = %channel, newly_added, "Storage channel registered");
                self.event_bus
                    .emit(CoreEvent::Channel(ChannelEvent::Registered {
                        channel_id: channel.to_string(),
                        newly_added,
                    }))
                    .ok();
            }
            SessionAction::StartUpload => {
                let inner = Arc::clone(self);
                let identity = Arc::clone(identity);
                self.tasks.spawn(async move {
                    let text = match inner.run_upload().await {
                        Ok(summary) if summary.interrupted => UPLOAD_INTERRUPTED_TEXT.to_string(),
                        Ok(_) => UPLOAD_DONE_TEXT.to_string(),
                        Err(e) => {
                            warn!(error = %e, "Upload job failed");
                            inner
                                .event_bus
                                .emit(CoreEvent::Upload(UploadEvent::Failed {
                                    message: e.to_string(),
                                }))
                                .ok();
                            format!("{} {}", UPLOAD_FAILED_TEXT, e)
                        }
                    };
                    inner
                        .reply(&identity, &session, &text, TextOptions::default())
                        .await;
                });
            }
            SessionAction::StartRestore => {
                let inner = Arc::clone(self);
                let identity = Arc::clone(identity);
                self.tasks.spawn(async move {
                    let text = match inner.run_restore().await {
                        Ok(summary) if summary.interrupted => RESTORE_INTERRUPTED_TEXT.to_string(),
                        Ok(summary) if summary.failed > 0 => format!(
                            "{} {} of {} files could not be restored.",
                            RESTORE_DONE_TEXT, summary.failed, summary.total_paths
                        ),
                        Ok(_) => RESTORE_DONE_TEXT.to_string(),
                        Err(e) => {
                            warn!(error = %e, "Restore job failed");
                            format!("{} {}", RESTORE_FAILED_TEXT, e)
                        }
                    };
                    inner
                        .reply(&identity, &session, &text, TextOptions::default())
                        .await;
                });
            }
        }
    }

    async fn run_upload(&self) -> Result<UploadSummary> {
        if self.shutdown.is_cancelled() {
            return Err(ServiceError::ShuttingDown);
        }

        let channels = self.registry.snapshot();
        if channels.is_empty() {
            return Err(BackupError::NoChannels.into());
        }

        let candidates = self.scanner.scan(&self.config.scan_root).await?;
        let summary = self
            .scheduler
            .run(candidates, channels, self.config.effective_concurrency())
            .await?;
        Ok(summary)
    }

    async fn run_restore(&self) -> Result<RestoreSummary> {
        if self.shutdown.is_cancelled() {
            return Err(ServiceError::ShuttingDown);
        }
        if self
            .restore_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ServiceError::RestoreInProgress);
        }

        let result = self.restorer.restore_all().await;
        self.restore_running.store(false, Ordering::SeqCst);
        Ok(result?)
    }

    /// Re-send an operator's attachment to every storage channel by remote id.
    async fn forward_attachment(
        &self,
        identity: &ClientIdentity,
        session: &ChatId,
        attachment: Attachment,
    ) {
        let channels = self.registry.snapshot();
        if channels.is_empty() {
            self.reply(identity, session, NO_CHANNELS_TEXT, TextOptions::default())
                .await;
            return;
        }

        let mut failures = 0usize;
        for channel in &channels {
            let sender = self.pool.next();
            let source = MediaSource::Remote(attachment.remote_id.clone());
            if let Err(e) = sender
                .transport()
                .send_media(attachment.kind, channel, source, None)
                .await
            {
                failures += 1;
                warn!(
                    identity = %sender.label(),
                    channel = %channel,
                    error = %e,
                    "Failed to forward attachment"
                );
            }
        }

        let text = if failures == 0 {
            FORWARDED_TEXT
        } else {
            FORWARD_FAILED_TEXT
        };
        self.reply(identity, session, text, TextOptions::default())
            .await;
    }

    async fn reply(&self, identity: &ClientIdentity, session: &ChatId, text: &str, options: TextOptions) {
        if let Err(e) = identity.transport().send_text(session, text, options).await {
            warn!(identity = %identity.label(), session = %session, error = %e, "Failed to send reply");
        }
    }

    async fn relay_reports(self: Arc<Self>, mut stream: EventStream) {
        loop {
            match self.relay_stop.run_until_cancelled(stream.recv()).await {
                Some(Ok(event)) => self.relay(&event).await,
                Some(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "Report relay fell behind, events dropped");
                }
                Some(Err(RecvError::Closed)) => break,
                None => {
                    loop {
                        match stream.try_recv() {
                            Some(Ok(event)) => self.relay(&event).await,
                            Some(Err(RecvError::Lagged(_))) => continue,
                            Some(Err(RecvError::Closed)) | None => break,
                        }
                    }
                    break;
                }
            }
        }
        debug!("Report relay stopped");
    }

    async fn relay(&self, event: &CoreEvent) {
        let Some(text) = reports::render(event) else {
            return;
        };
        debug!(event = event.description(), "Relaying report");

        let primary = self.pool.primary();
        if let Err(e) = primary
            .transport()
            .send_text(&self.config.admin_chat, &text, TextOptions::default())
            .await
        {
            warn!(identity = %primary.label(), error = %e, "Failed to deliver report");
        }
    }
}
