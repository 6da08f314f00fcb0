//! Error types for the Telegram provider

use std::time::Duration;

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Telegram provider errors
#[derive(Error, Debug)]
pub enum TelegramError {
    /// The Bot API rejected the call
    #[error("Telegram API error (status {status}): {description}")]
    Api { status: u16, description: String },

    /// Flood control kicked in
    #[error("Rate limited by Telegram{}", retry_suffix(.retry_after_seconds))]
    RateLimited { retry_after_seconds: Option<u64> },

    /// Failed to parse API response
    #[error("Failed to parse Telegram response: {0}")]
    ParseError(String),

    /// A send succeeded but the message carried no media we could identify
    #[error("Sent message carries no {0} file id")]
    MissingFileId(&'static str),

    /// `getFile` returned no download path (file too large for bots)
    #[error("File {0} has no download path")]
    MissingFilePath(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

fn retry_suffix(seconds: &Option<u64>) -> String {
    match seconds {
        Some(seconds) => format!(", retry after {} seconds", seconds),
        None => String::new(),
    }
}

/// Result type for Telegram operations
pub type Result<T> = std::result::Result<T, TelegramError>;

impl From<TelegramError> for BridgeError {
    fn from(error: TelegramError) -> Self {
        match error {
            TelegramError::Api {
                status,
                description,
            } => BridgeError::Api {
                status,
                message: description,
            },
            TelegramError::RateLimited {
                retry_after_seconds,
            } => BridgeError::RateLimited {
                retry_after: retry_after_seconds.map(Duration::from_secs),
            },
            TelegramError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            TelegramError::MissingFileId(kind) => {
                BridgeError::OperationFailed(format!("Sent message carries no {} file id", kind))
            }
            TelegramError::MissingFilePath(file_id) => {
                BridgeError::OperationFailed(format!("File {} has no download path", file_id))
            }
            TelegramError::Bridge(e) => e,
        }
    }
}
