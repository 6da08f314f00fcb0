use crate::metadata::snapshot::SnapshotError;
use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Client pool requires at least one identity")]
    EmptyClientPool,

    #[error("No storage channels registered")]
    NoChannels,

    #[error("Upload already in progress (run {run_id})")]
    UploadInProgress { run_id: String },

    #[error("Scan root not found: {0}")]
    ScanRootMissing(String),

    #[error("Invalid relative path: {0}")]
    InvalidPath(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(#[from] SnapshotError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BackupError>;
