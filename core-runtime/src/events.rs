//! # Event Bus System
//!
//! Progress events for transfer runs, delivered over a broadcast channel.
//!
//! ## Overview
//!
//! - [`TransferEvent`]: what happened (walk finished, item started/succeeded/failed,
//!   run completed, run cancelled)
//! - [`EventBus`]: cloneable publisher; every subscriber gets every event
//! - [`EventStream`]: receiver wrapper with an optional filter
//!
//! Publishing never blocks and never fails the run: with no subscribers
//! [`EventBus::emit`] returns an error the engine ignores.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::events::{EventBus, TransferEvent};
//!
//! let bus = EventBus::default();
//! let mut events = bus.subscribe();
//!
//! core_async::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let TransferEvent::ItemFailed { source_path, reason, .. } = event {
//!             eprintln!("{source_path}: {reason}");
//!         }
//!     }
//! });
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n` events;
//!   it can keep receiving.
//! - **`RecvError::Closed`**: every bus handle was dropped; the run is over.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel
///
/// Large runs emit several events per item; subscribers that fall further
/// behind than this receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1024;

/// Event severity levels for filtering and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Progress of a transfer run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// The source tree has been enumerated
    WalkCompleted {
        items: usize,
        folders: usize,
        failed_subtrees: usize,
        skipped: usize,
    },
    /// A worker picked up an item
    ItemStarted { source_path: String },
    /// An item reached its destination
    ItemSucceeded {
        source_path: String,
        destination_id: String,
        bytes: u64,
        attempts: u32,
    },
    /// An item failed for good
    ItemFailed {
        source_path: String,
        /// `transient`, `permanent` or `structural`
        class: String,
        reason: String,
    },
    /// Every item has a record
    RunCompleted {
        succeeded: usize,
        failed: usize,
        bytes: u64,
        duration_ms: u64,
    },
    /// A stop signal was observed; `pending` items were never dispatched
    Cancelled { pending: usize },
}

impl TransferEvent {
    pub fn description(&self) -> &'static str {
        match self {
            TransferEvent::WalkCompleted { .. } => "Source tree enumerated",
            TransferEvent::ItemStarted { .. } => "Item transfer started",
            TransferEvent::ItemSucceeded { .. } => "Item transferred",
            TransferEvent::ItemFailed { .. } => "Item transfer failed",
            TransferEvent::RunCompleted { .. } => "Transfer run completed",
            TransferEvent::Cancelled { .. } => "Transfer run cancelled",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            TransferEvent::ItemFailed { .. } => EventSeverity::Error,
            TransferEvent::Cancelled { .. } => EventSeverity::Warning,
            TransferEvent::WalkCompleted {
                failed_subtrees, ..
            } if *failed_subtrees > 0 => EventSeverity::Warning,
            TransferEvent::ItemStarted { .. } | TransferEvent::ItemSucceeded { .. } => {
                EventSeverity::Debug
            }
            _ => EventSeverity::Info,
        }
    }
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferEvent::ItemStarted { source_path }
            | TransferEvent::ItemSucceeded { source_path, .. }
            | TransferEvent::ItemFailed { source_path, .. } => {
                write!(f, "{}: {}", self.description(), source_path)
            }
            _ => f.write_str(self.description()),
        }
    }
}

/// Central publisher of [`TransferEvent`]s
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TransferEvent>,
}

impl EventBus {
    /// Creates a bus buffering at most `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event, returning how many subscribers received it
    ///
    /// Fails only when nobody is subscribed.
    pub fn emit(&self, event: TransferEvent) -> Result<usize, SendError<TransferEvent>> {
        self.sender.send(event)
    }

    /// Creates an independent receiver of all future events
    pub fn subscribe(&self) -> Receiver<TransferEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&TransferEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events rejected by a filter
pub struct EventStream {
    receiver: Receiver<TransferEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<TransferEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TransferEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Keep only events at or above `min` severity
    pub fn min_severity(self, min: EventSeverity) -> Self {
        self.filter(move |event| event.severity() >= min)
    }

    fn accepts(&self, event: &TransferEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Receives the next event that passes the filter
    pub async fn recv(&mut self) -> Result<TransferEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` when no matching event is buffered
    pub fn try_recv(&mut self) -> Option<Result<TransferEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Some(Err(RecvError::Closed))
                }
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
