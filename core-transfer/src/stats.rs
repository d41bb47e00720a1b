//! # Run Statistics
//!
//! Audit records and the aggregator every worker reports into.

use crate::item::TransferItem;
use chrono::{DateTime, Utc};
use core_async::sync::Mutex;
use serde::{Deserialize, Serialize};

/// Outcome of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::Failed => "failed",
        }
    }
}

/// Append-only audit entry, one per item
///
/// Field order is the persisted column order: the eight core fields first,
/// then the extended source metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub source_path: String,
    pub source_id: String,
    pub destination_path: Option<String>,
    pub destination_id: Option<String>,
    /// Bytes actually written to the destination
    pub bytes: u64,
    pub status: RecordStatus,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,

    pub mime_type: Option<String>,
    pub source_created: Option<DateTime<Utc>>,
    pub source_modified: Option<DateTime<Utc>>,
    pub owner: Option<String>,
    /// Size reported by the source listing
    pub original_size: Option<u64>,
    pub exported: bool,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Column names in serialization order
    pub const COLUMNS: [&'static str; 17] = [
        "source_path",
        "source_id",
        "destination_path",
        "destination_id",
        "bytes",
        "status",
        "error_message",
        "timestamp",
        "mime_type",
        "source_created",
        "source_modified",
        "owner",
        "original_size",
        "exported",
        "attempts",
        "started_at",
        "finished_at",
    ];

    fn from_item(
        item: &TransferItem,
        status: RecordStatus,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let node = &item.node;
        Self {
            source_path: item.source_path(),
            source_id: node.id.clone(),
            destination_path: None,
            destination_id: None,
            bytes: 0,
            status,
            error_message: None,
            timestamp: finished_at,
            mime_type: node.mime_type.clone(),
            source_created: node.created_at.and_then(|s| DateTime::from_timestamp(s, 0)),
            source_modified: node.modified_at.and_then(|s| DateTime::from_timestamp(s, 0)),
            owner: node.owner.clone(),
            original_size: node.size,
            exported: item.is_export(),
            attempts: 0,
            started_at,
            finished_at,
        }
    }

    pub fn success(
        item: &TransferItem,
        destination_path: String,
        destination_id: String,
        bytes: u64,
        attempts: u32,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            destination_path: Some(destination_path),
            destination_id: Some(destination_id),
            bytes,
            attempts,
            ..Self::from_item(item, RecordStatus::Success, started_at, finished_at)
        }
    }

    pub fn failure(
        item: &TransferItem,
        error_message: impl Into<String>,
        attempts: u32,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            error_message: Some(error_message.into()),
            attempts,
            ..Self::from_item(item, RecordStatus::Failed, started_at, finished_at)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}

/// Aggregate counts and records of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub succeeded: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub records: Vec<TransferRecord>,
}

impl Stats {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }
}

/// Thread-safe sink for item outcomes
///
/// Each report takes the lock once, so counts and records never diverge.
/// Record order across workers is unspecified.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<Stats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self, bytes: u64, record: TransferRecord) {
        let mut stats = self.inner.lock().await;
        stats.succeeded += 1;
        stats.total_bytes += bytes;
        stats.records.push(record);
    }

    pub async fn record_failure(&self, record: TransferRecord) {
        let mut stats = self.inner.lock().await;
        stats.failed += 1;
        stats.records.push(record);
    }

    /// Copy of the current totals and records
    pub async fn snapshot(&self) -> Stats {
        self.inner.lock().await.clone()
    }
}
