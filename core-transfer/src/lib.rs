//! # Hierarchical Transfer Engine
//!
//! Copies a folder tree from one [`RemoteStore`](bridge_traits::RemoteStore)
//! to another, keeping the folder structure and recording what happened to
//! every item.
//!
//! ## Components
//!
//! - **Walker** (`walker`): enumerates the source tree, handles pagination,
//!   cycles, exclude patterns and document export formats
//! - **Folder resolver** (`folder_cache`): maps relative paths to destination
//!   folders, creating each one once even under concurrent access
//! - **Worker pool** (`pool`): bounded parallel fetch → convert → write with
//!   retry; each item's payload buffer belongs to its own task
//! - **Statistics** (`stats`): thread-safe counters and audit records
//! - **Exporters** (`export`): CSV and JSON serialization of the records
//! - **Inventory** (`inventory`): list mode, a walk-only description of the
//!   source tree written through the same outputs
//! - **Coordinator** (`coordinator`): runs the whole pipeline and builds the report

pub mod convert;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod folder_cache;
pub mod inventory;
pub mod item;
pub mod pool;
pub mod retry;
pub mod stats;
pub mod walker;

pub use convert::{ContentConverter, Converted};
pub use coordinator::{SubtreeFailure, TransferCoordinator, TransferReport};
pub use error::{FailureClass, Result, TransferError};
pub use export::{export_metadata, CsvExporter, JsonExporter, MetadataExporter};
pub use folder_cache::{FolderCache, FolderKey, FolderResolver, StructuralFailure};
pub use inventory::{export_inventory, list_tree, Inventory, InventoryEntry};
pub use item::{ItemLifecycle, ItemState, RelativePath, TransferItem};
pub use pool::{PoolSummary, TransferWorkerPool, WorkerContext};
pub use retry::RetryPolicy;
pub use stats::{RecordStatus, Stats, StatsAggregator, TransferRecord};
pub use walker::{
    ExcludeMatcher, ExportTable, FailedSubtree, RemoteTreeWalker, WalkResult, WalkWarning,
};
