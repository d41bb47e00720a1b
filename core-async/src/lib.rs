//! Runtime façade for the tree transfer crates.
//!
//! All `core-*` and `provider-*` crates depend on this crate instead of naming
//! tokio directly, which keeps the executor choice in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and join handles
//! - `time`: Sleep, timeout, durations and instants
//! - `sync`: Async locks, semaphores, channels, cancellation
//! - `runtime`: Building and driving runtimes from synchronous code
//! - `signal`: Ctrl-C notification for graceful shutdown
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

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod signal;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
