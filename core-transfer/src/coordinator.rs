//! # Transfer Coordinator
//!
//! Runs one transfer end to end.
//!
//! ## Workflow
//!
//! 1. Walk the source tree (pure discovery, nothing is created)
//! 2. Hand every discovered item to the worker pool
//! 3. Workers resolve destination folders through the shared cache, then
//!    fetch, optionally convert and write each item
//! 4. Snapshot the statistics once the pool has drained
//! 5. Export the metadata records if an output was configured
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_transfer::TransferCoordinator;
//! use core_async::sync::CancellationToken;
//!
//! let coordinator = TransferCoordinator::new(source, destination, config)?
//!     .with_event_bus(bus.clone());
//! let report = coordinator.run("source-folder-id", "dest-folder-id", CancellationToken::new()).await?;
//! println!("{report}");
//! ```

use crate::convert::ContentConverter;
use crate::error::Result;
use crate::export::export_metadata;
use crate::folder_cache::FolderResolver;
use crate::pool::{TransferWorkerPool, WorkerContext};
use crate::retry::RetryPolicy;
use crate::stats::{Stats, StatsAggregator};
use crate::walker::{FailedSubtree, RemoteTreeWalker, WalkWarning};
use bridge_traits::storage::RemoteStore;
use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::CancellationToken;
use core_async::time::{Duration, Instant};
use core_runtime::config::TransferConfig;
use core_runtime::events::{EventBus, TransferEvent};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// A source folder whose contents could not be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeFailure {
    pub path: String,
    pub folder_id: String,
    pub reason: String,
}

impl From<&FailedSubtree> for SubtreeFailure {
    fn from(failed: &FailedSubtree) -> Self {
        Self {
            path: failed.path.to_string(),
            folder_id: failed.folder_id.clone(),
            reason: failed.error.record_message(),
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub stats: Stats,
    pub items_discovered: usize,
    pub folders_discovered: usize,
    pub failed_subtrees: Vec<SubtreeFailure>,
    pub warnings: Vec<WalkWarning>,
    pub folders_created: u64,
    pub duration: Duration,
    pub cancelled: bool,
    pub metadata_path: Option<PathBuf>,
    /// Set when the metadata file could not be written
    pub metadata_error: Option<String>,
}

impl TransferReport {
    /// Whether any item or sub-tree failed
    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0 || !self.failed_subtrees.is_empty()
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        if self.cancelled {
            writeln!(f, "Transfer cancelled")?;
        } else if self.has_failures() {
            writeln!(f, "Transfer finished with failures")?;
        } else {
            writeln!(f, "Transfer complete")?;
        }
        writeln!(f, "{rule}")?;
        writeln!(f, "{:<24}{}", "Items discovered", self.items_discovered)?;
        writeln!(f, "{:<24}{}", "Succeeded", self.stats.succeeded)?;
        writeln!(f, "{:<24}{}", "Failed", self.stats.failed)?;
        writeln!(f, "{:<24}{}", "Bytes transferred", self.stats.total_bytes)?;
        writeln!(f, "{:<24}{}", "Folders created", self.folders_created)?;
        writeln!(f, "{:<24}{}", "Failed subtrees", self.failed_subtrees.len())?;
        writeln!(f, "{:<24}{}", "Warnings", self.warnings.len())?;
        writeln!(f, "{:<24}{:.2}s", "Duration", self.duration.as_secs_f64())?;
        if let Some(path) = &self.metadata_path {
            writeln!(f, "{:<24}{}", "Metadata", path.display())?;
        }
        if let Some(error) = &self.metadata_error {
            writeln!(f, "{:<24}{}", "Metadata error", error)?;
        }
        for subtree in &self.failed_subtrees {
            let path = if subtree.path.is_empty() { "/" } else { &subtree.path };
            writeln!(f, "  subtree {}: {}", path, subtree.reason)?;
        }
        for record in self.stats.failures() {
            writeln!(
                f,
                "  failed {}: {}",
                record.source_path,
                record.error_message.as_deref().unwrap_or("unknown error")
            )?;
        }
        Ok(())
    }
}

/// Wires the walker, resolver, pool and exporters for one transfer
pub struct TransferCoordinator {
    source: Arc<dyn RemoteStore>,
    destination: Arc<dyn RemoteStore>,
    config: TransferConfig,
    events: Option<EventBus>,
    converters: Vec<Arc<dyn ContentConverter>>,
    clock: Arc<dyn Clock>,
}

impl TransferCoordinator {
    pub fn new(
        source: Arc<dyn RemoteStore>,
        destination: Arc<dyn RemoteStore>,
        config: TransferConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            destination,
            config,
            events: None,
            converters: Vec::new(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Register a converter; the first one that applies to an item is used
    pub fn with_converter(mut self, converter: Arc<dyn ContentConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(event);
        }
    }

    /// Copies everything under `source_root` into `destination_root`
    ///
    /// Item and sub-tree failures are reported in the returned
    /// [`TransferReport`]; only setup errors such as an invalid exclude
    /// pattern fail the call itself.
    #[instrument(skip(self, cancel), fields(source = self.source.name(), destination = self.destination.name()))]
    pub async fn run(
        &self,
        source_root: &str,
        destination_root: &str,
        cancel: CancellationToken,
    ) -> Result<TransferReport> {
        let started = Instant::now();
        let retry = RetryPolicy::from_config(&self.config);

        let walker = RemoteTreeWalker::from_config(self.source.clone(), &self.config)?
            .with_cancellation(cancel.clone());
        let walk = walker.walk(source_root).await;

        self.emit(TransferEvent::WalkCompleted {
            items: walk.items.len(),
            folders: walk.folder_count(),
            failed_subtrees: walk.failed_subtrees.len(),
            skipped: walk.skipped_count(),
        });

        let items_discovered = walk.items.len();
        let folders_discovered = walk.folder_count();
        let failed_subtrees = walk.failed_subtrees.iter().map(SubtreeFailure::from).collect();

        let resolver = Arc::new(FolderResolver::new(self.destination.clone(), retry));
        let stats = Arc::new(StatsAggregator::new());
        let ctx = WorkerContext {
            source: self.source.clone(),
            destination: self.destination.clone(),
            destination_root: destination_root.to_string(),
            resolver: resolver.clone(),
            stats: stats.clone(),
            retry,
            converters: self.converters.clone(),
            events: self.events.clone(),
            clock: self.clock.clone(),
        };

        info!(items = items_discovered, workers = self.config.workers, "Starting transfer");
        let pool = TransferWorkerPool::new(ctx, self.config.workers);
        let summary = pool.run(walk.items, cancel.clone()).await;
        let snapshot = stats.snapshot().await;

        let (metadata_path, metadata_error) = match &self.config.metadata_output {
            Some(output) => match export_metadata(&snapshot, output) {
                Ok(()) => (Some(output.path.clone()), None),
                Err(e) => {
                    error!(path = %output.path.display(), error = %e, "Metadata export failed");
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        let duration = started.elapsed();
        self.emit(TransferEvent::RunCompleted {
            succeeded: snapshot.succeeded,
            failed: snapshot.failed,
            bytes: snapshot.total_bytes,
            duration_ms: duration.as_millis() as u64,
        });
        info!(
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            bytes = snapshot.total_bytes,
            folders_created = resolver.folders_created(),
            elapsed_ms = duration.as_millis() as u64,
            "Transfer finished"
        );

        Ok(TransferReport {
            stats: snapshot,
            items_discovered,
            folders_discovered,
            failed_subtrees,
            warnings: walk.warnings,
            folders_created: resolver.folders_created(),
            duration,
            cancelled: walk.cancelled || summary.not_dispatched > 0 || cancel.is_cancelled(),
            metadata_path,
            metadata_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::LocalFolderStore;
    use core_runtime::events::EventStream;
    use tempfile::TempDir;

    fn local(dir: &TempDir) -> Arc<dyn RemoteStore> {
        Arc::new(LocalFolderStore::new(dir.path()))
    }

    #[core_async::test]
    async fn test_local_to_local_copy_with_metadata() {
        let source = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();
        let reports = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.txt"), b"0123456789").unwrap();
        std::fs::create_dir_all(source.path().join("b")).unwrap();
        std::fs::write(source.path().join("b/c.txt"), vec![7u8; 20]).unwrap();
        std::fs::create_dir_all(source.path().join(".git")).unwrap();
        std::fs::write(source.path().join(".git/HEAD"), b"ref").unwrap();

        let config = TransferConfig::builder()
            .workers(2)
            .metadata_output(reports.path().join("run.csv"))
            .build()
            .unwrap();
        let bus = EventBus::new(64);
        let mut events = EventStream::new(bus.subscribe())
            .filter(|e| matches!(e, TransferEvent::RunCompleted { .. }));

        let report = TransferCoordinator::new(local(&source), local(&destination), config)
            .unwrap()
            .with_event_bus(bus.clone())
            .run(
                LocalFolderStore::ROOT_ID,
                LocalFolderStore::ROOT_ID,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!report.has_failures());
        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.total_bytes, 30);
        assert_eq!(report.folders_created, 1);
        assert!(!destination.path().join(".git").exists());
        assert_eq!(
            std::fs::read(destination.path().join("b/c.txt")).unwrap(),
            vec![7u8; 20]
        );

        let csv = std::fs::read_to_string(reports.path().join("run.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert_eq!(report.metadata_path, Some(reports.path().join("run.csv")));

        let completed = events.recv().await.unwrap();
        assert!(matches!(
            completed,
            TransferEvent::RunCompleted {
                succeeded: 2,
                failed: 0,
                bytes: 30,
                ..
            }
        ));
        assert!(report.to_string().contains("Transfer complete"));
    }

    #[core_async::test]
    async fn test_missing_source_root_is_a_failed_subtree() {
        let source = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();
        let config = TransferConfig::builder().max_retries(0).build().unwrap();

        let report = TransferCoordinator::new(local(&source), local(&destination), config)
            .unwrap()
            .run("does-not-exist", LocalFolderStore::ROOT_ID, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.items_discovered, 0);
        assert_eq!(report.failed_subtrees.len(), 1);
        assert!(report.has_failures());
        assert!(report.failed_subtrees[0].reason.starts_with("permanent:"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let source = TempDir::new().unwrap();
        let mut config = TransferConfig::default();
        config.workers = 0;
        assert!(TransferCoordinator::new(local(&source), local(&source), config).is_err());
    }
}
