//! # Retry Classification
//!
//! Every failed upload attempt is sorted into one of three classes, each with
//! its own wait before the next attempt:
//!
//! | Class              | Wait                                              |
//! |--------------------|---------------------------------------------------|
//! | `RateLimited`      | server hint, else `min(attempt * base, max)`      |
//! | `TransientNetwork` | `min(attempt * base, max)`                        |
//! | `Permanent`        | none                                              |
//!
//! All classes share one attempt ceiling.

use crate::BackupError;
use bridge_traits::BridgeError;
use core_runtime::config::UploadSettings;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited { retry_after: Option<Duration> },
    TransientNetwork,
    Permanent,
}

impl FailureClass {
    pub fn classify(error: &BackupError) -> Self {
        match error {
            BackupError::Bridge(bridge) => Self::from_bridge(bridge),
            _ => FailureClass::Permanent,
        }
    }

    /// Server-side 5xx responses are treated like dropped connections.
    pub fn from_bridge(error: &BridgeError) -> Self {
        match error {
            BridgeError::RateLimited { retry_after } => FailureClass::RateLimited {
                retry_after: *retry_after,
            },
            BridgeError::Network(_) => FailureClass::TransientNetwork,
            BridgeError::Api { status, .. } if *status >= 500 => FailureClass::TransientNetwork,
            _ => FailureClass::Permanent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::RateLimited { .. } => "rate_limited",
            FailureClass::TransientNetwork => "transient_network",
            FailureClass::Permanent => "permanent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&UploadSettings> for RetryPolicy {
    fn from(settings: &UploadSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: settings.retry_base_delay,
            max_delay: settings.retry_max_delay,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, class: &FailureClass, attempt: u32) -> Duration {
        match class {
            FailureClass::RateLimited {
                retry_after: Some(hint),
            } => *hint,
            FailureClass::RateLimited { retry_after: None } | FailureClass::TransientNetwork => {
                self.backoff(attempt)
            }
            FailureClass::Permanent => Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt.max(1))
            .min(self.max_delay)
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
