//! Synchronization primitives.
//!
//! All primitives are async-aware: holding a guard across `.await` never
//! blocks the executor thread. Cancellation uses `tokio_util`'s
//! [`CancellationToken`], which is cheap to clone and hand to every worker.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{Mutex, OnceCell};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     *mutex.lock().await += 1;
//!
//!     let cell: OnceCell<String> = OnceCell::new();
//!     let value = cell.get_or_init(|| async { "folder-id".to_string() }).await;
//!     assert_eq!(value, "folder-id");
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Barrier, Mutex, MutexGuard, Notify, OnceCell, RwLock,
    RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::CancellationToken;
