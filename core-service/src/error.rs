use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Service already started")]
    AlreadyStarted,

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Restore already in progress")]
    RestoreInProgress,

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Backup error: {0}")]
    Backup(#[from] core_backup::BackupError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
