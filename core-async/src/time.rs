//! Time-related operations.
//!
//! `Instant` is Tokio's instant so tests running with a paused clock observe
//! the same time the scheduler does.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(5)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(5));
//! }
//! ```

pub use std::time::Duration;
pub use tokio::time::{
    error::Elapsed, interval, interval_at, sleep, sleep_until, timeout, Instant, Interval,
    MissedTickBehavior, Sleep, Timeout,
};

/// Sleep for `duration`, returning early with `false` if `token` is cancelled.
///
/// Returns `true` when the full duration elapsed.
pub async fn sleep_or_cancel(
    duration: Duration,
    token: &crate::sync::CancellationToken,
) -> bool {
    tokio::select! {
        _ = sleep(duration) => true,
        _ = token.cancelled() => false,
    }
}
