//! # Bridge Traits
//!
//! Capability contracts shared by the transfer engine and the concrete stores.
//!
//! ## Traits
//!
//! - [`RemoteStore`](storage::RemoteStore) - List, read, export and write nodes of a tree
//! - [`HttpClient`](http::HttpClient) - Single-shot async HTTP used by cloud stores
//! - [`Clock`](time::Clock) - Time source for audit timestamps
//! - [`LoggerSink`](time::LoggerSink) - Receives structured log entries
//!
//! ## Error Handling
//!
//! Every call returns [`BridgeError`](error::BridgeError). Adapters classify
//! their native failures as transient (worth retrying) or permanent with a
//! [`PermanentReason`](error::PermanentReason); the engine never inspects
//! store-specific error types.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so one store instance can be shared by
//! every worker of a transfer run.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::{BridgeError, PermanentReason};

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{ExportFormat, NodeKind, RemoteNode, RemoteStore};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, MemoryLogSink, SystemClock};
