//! # Backup & Restore Module
//!
//! Moves a local drive into chat channels and back.
//!
//! ## Overview
//!
//! This crate owns everything between the local filesystem and the chat
//! transports:
//! - Spreading requests across several bot identities
//! - Tracking which files already live remotely
//! - Uploading with bounded concurrency, retries and periodic progress
//! - Restoring recorded files into a local directory tree
//!
//! ## Components
//!
//! - **Client Pool** (`pool`): Round-robin selection over bot identities
//! - **Channel Registry** (`channels`): Runtime-mutable set of storage channels
//! - **Metadata Store** (`metadata`): Durable record index with an atomic snapshot
//! - **Local Scanner** (`scan`): Recursive walk producing upload candidates
//! - **Upload Scheduler** (`upload`): Worker pool draining the candidate queue
//! - **Restore Engine** (`restore`): Streams recorded objects back to disk
//! - **Retry** (`retry`) and **Progress** (`progress`): Failure classes and counters

pub mod channels;
pub mod error;
pub mod media;
pub mod metadata;
pub mod pool;
pub mod progress;
pub mod restore;
pub mod retry;
pub mod scan;
pub mod upload;

pub use channels::ChannelRegistry;
pub use error::{BackupError, Result};
pub use metadata::{snapshot::SnapshotError, FileRecord, MetadataStore};
pub use pool::{ClientIdentity, ClientPool};
pub use progress::{ProgressSnapshot, UploadStats};
pub use restore::{RestoreEngine, RestoreSummary};
pub use retry::{FailureClass, RetryPolicy};
pub use scan::LocalScanner;
pub use upload::{UploadConfig, UploadRunId, UploadScheduler, UploadSummary};
