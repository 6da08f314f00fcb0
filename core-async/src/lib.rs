//! Async runtime facade for TeleCloud.
//!
//! Every library crate in the workspace reaches the Tokio runtime through this
//! crate instead of depending on `tokio` directly. That keeps the set of
//! primitives in use small and visible in one place:
//!
//! - `task`: spawning, blocking offload, join sets
//! - `time`: sleep, interval, timeout, instants
//! - `sync`: async mutexes, channels, cancellation tokens
//! - `io`: async read/write traits and copy helpers
//! - `signal`: process termination signals for the harness
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod io;
pub mod signal;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
