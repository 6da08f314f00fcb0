//! Task spawning and execution.
//!
//! `spawn` runs futures on the multi-threaded runtime; `spawn_blocking` moves
//! CPU or synchronous filesystem work (snapshot compression, atomic renames)
//! off the async workers.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//!
//!     let sum = task::spawn_blocking(|| (1..=10).sum::<u32>()).await.unwrap();
//!     assert_eq!(sum, 55);
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle, JoinSet};
pub use tokio_util::task::TaskTracker;

/// Spawns a new asynchronous task on the Tokio runtime.
///
/// The returned `JoinHandle` resolves to the task's output, or to a
/// `JoinError` if the task panicked or was aborted.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
