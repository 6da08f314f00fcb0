//! # Event Bus System
//!
//! Event-driven plumbing for the backup engine using `tokio::sync::broadcast`.
//! The upload scheduler and restore engine publish typed events; the service
//! layer subscribes and turns them into operator-facing reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit    ┌───────────┐  subscribe  ┌──────────────┐
//! │ UploadScheduler├──────────>│           ├────────────>│ Report relay │
//! └────────────────┘           │ EventBus  │             └──────────────┘
//! ┌────────────────┐   emit    │ (broadcast│  subscribe  ┌──────────────┐
//! │ RestoreEngine  ├──────────>│  channel) ├────────────>│ Tests        │
//! └────────────────┘           └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, RestoreEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Restore(RestoreEvent::Started { total_paths: 3 }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Restore(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it may keep
//!   receiving. Progress reports are periodic, so losing one is harmless.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed. Publishers ignore that error.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Upload run events
    Upload(UploadEvent),
    /// Restore run events
    Restore(RestoreEvent),
    /// Storage channel registry events
    Channel(ChannelEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Restore(e) => e.description(),
            CoreEvent::Channel(e) => e.description(),
        }
    }
}

// ============================================================================
// Upload Events
// ============================================================================

/// Events emitted by an upload run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    /// A run was admitted and its queue filled.
    Started {
        run_id: String,
        total_files: u64,
        channels: usize,
        concurrency: usize,
    },
    /// Periodic status report.
    Progress {
        run_id: String,
        uploaded_files: u64,
        skipped_files: u64,
        failed_files: u64,
        total_files: u64,
        /// Share of the total stored remotely, uploaded or skipped, 0-100.
        percent: u8,
        elapsed_secs: u64,
        /// Files uploaded per minute since the previous report.
        rate_per_minute: f64,
        /// Estimated seconds until every file settles, when a rate is known.
        eta_secs: Option<u64>,
    },
    /// One file exhausted its attempts.
    FileFailed {
        run_id: String,
        relative_path: String,
        attempts: u32,
        message: String,
    },
    /// Every worker drained; emitted regardless of individual outcomes.
    Completed {
        run_id: String,
        uploaded_files: u64,
        skipped_files: u64,
        failed_files: u64,
        total_files: u64,
        duration_secs: u64,
        /// Files uploaded per minute over the whole run.
        average_rate_per_minute: f64,
        /// Set when shutdown stopped the run before the queue drained.
        interrupted: bool,
    },
    /// The run could not start.
    Failed { message: String },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::Started { .. } => "Upload started",
            UploadEvent::Progress { .. } => "Upload in progress",
            UploadEvent::FileFailed { .. } => "File upload failed",
            UploadEvent::Completed { .. } => "Upload completed",
            UploadEvent::Failed { .. } => "Upload failed to start",
        }
    }
}

// ============================================================================
// Restore Events
// ============================================================================

/// Events emitted by a restore run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RestoreEvent {
    Started {
        total_paths: u64,
    },
    Completed {
        restored: u64,
        failed: u64,
        duration_secs: u64,
    },
}

impl RestoreEvent {
    fn description(&self) -> &str {
        match self {
            RestoreEvent::Started { .. } => "Restore started",
            RestoreEvent::Completed { .. } => "Restore completed",
        }
    }
}

// ============================================================================
// Channel Events
// ============================================================================

/// Events about the set of storage channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ChannelEvent {
    Registered {
        channel_id: String,
        /// False when the channel was already known.
        newly_added: bool,
    },
}

impl ChannelEvent {
    fn description(&self) -> &str {
        match self {
            ChannelEvent::Registered { .. } => "Storage channel registered",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender, so every clone publishes into the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::default();
/// let uploads_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Upload(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
