//! # Tree Inventory
//!
//! List mode: walk a source tree and describe every file and folder in it
//! without transferring anything. The inventory is written through the same
//! CSV/JSON outputs as run records.

use crate::coordinator::SubtreeFailure;
use crate::error::{Result, TransferError};
use crate::export::create_sink;
use crate::walker::{RemoteTreeWalker, WalkResult, WalkWarning};
use bridge_traits::storage::{NodeKind, RemoteNode, RemoteStore};
use chrono::{DateTime, Utc};
use core_async::sync::CancellationToken;
use core_runtime::config::{MetadataFormat, MetadataOutput, TransferConfig};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, instrument};

/// One discovered node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub path: String,
    pub id: String,
    pub kind: NodeKind,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub owner: Option<String>,
}

impl InventoryEntry {
    pub const COLUMNS: [&'static str; 8] = [
        "path", "id", "kind", "mime_type", "size", "created", "modified", "owner",
    ];

    fn new(path: String, node: &RemoteNode) -> Self {
        Self {
            path,
            id: node.id.clone(),
            kind: node.kind,
            mime_type: node.mime_type.clone(),
            size: node.size,
            created: node.created_at.and_then(|s| DateTime::from_timestamp(s, 0)),
            modified: node.modified_at.and_then(|s| DateTime::from_timestamp(s, 0)),
            owner: node.owner.clone(),
        }
    }
}

/// Everything a walk found, sorted by path
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub files: usize,
    pub folders: usize,
    pub total_bytes: u64,
    pub entries: Vec<InventoryEntry>,
    #[serde(skip)]
    pub failed_subtrees: Vec<SubtreeFailure>,
    #[serde(skip)]
    pub warnings: Vec<WalkWarning>,
    #[serde(skip)]
    pub cancelled: bool,
}

impl Inventory {
    /// Files and exportable documents come from the walk's items, folders
    /// from the paths it assigned; folders reached twice appear once
    pub fn from_walk(walk: &WalkResult) -> Self {
        let folder_nodes: HashMap<&str, &RemoteNode> = walk
            .nodes
            .iter()
            .filter(|n| n.is_folder())
            .map(|n| (n.id.as_str(), n))
            .collect();

        let mut entries: Vec<InventoryEntry> = walk
            .folder_paths
            .iter()
            .filter(|(_, path)| !path.is_root())
            .filter_map(|(id, path)| {
                let node = folder_nodes.get(id.as_str())?;
                Some(InventoryEntry::new(path.to_string(), node))
            })
            .collect();
        let folders = entries.len();

        entries.extend(
            walk.items
                .iter()
                .map(|item| InventoryEntry::new(item.source_path(), &item.node)),
        );
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            files: walk.items.len(),
            folders,
            total_bytes: walk.items.iter().filter_map(|i| i.node.size).sum(),
            entries,
            failed_subtrees: walk.failed_subtrees.iter().map(SubtreeFailure::from).collect(),
            warnings: walk.warnings.clone(),
            cancelled: walk.cancelled,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_subtrees.is_empty() && !self.cancelled
    }

    pub fn write(&self, format: MetadataFormat, sink: &mut dyn Write) -> Result<()> {
        let export_error = |e: &dyn fmt::Display| TransferError::Export(e.to_string());
        match format {
            MetadataFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(sink);
                writer
                    .write_record(InventoryEntry::COLUMNS)
                    .map_err(|e| export_error(&e))?;
                for entry in &self.entries {
                    writer.serialize(entry).map_err(|e| export_error(&e))?;
                }
                writer.flush().map_err(|e| export_error(&e))
            }
            MetadataFormat::Json => {
                serde_json::to_writer_pretty(&mut *sink, self).map_err(|e| export_error(&e))?;
                sink.write_all(b"\n")
                    .and_then(|_| sink.flush())
                    .map_err(|e| export_error(&e))
            }
        }
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "{}", if self.cancelled { "Listing cancelled" } else { "Listing complete" })?;
        writeln!(f, "{rule}")?;
        writeln!(f, "{:<24}{}", "Files", self.files)?;
        writeln!(f, "{:<24}{}", "Folders", self.folders)?;
        writeln!(f, "{:<24}{}", "Total bytes", self.total_bytes)?;
        writeln!(f, "{:<24}{}", "Failed subtrees", self.failed_subtrees.len())?;
        writeln!(f, "{:<24}{}", "Warnings", self.warnings.len())?;
        for subtree in &self.failed_subtrees {
            let path = if subtree.path.is_empty() { "/" } else { &subtree.path };
            writeln!(f, "  subtree {}: {}", path, subtree.reason)?;
        }
        Ok(())
    }
}

/// Walks `root_id` with the walker settings of `config`; nothing is written
#[instrument(skip(source, config, cancel), fields(source = source.name()))]
pub async fn list_tree(
    source: Arc<dyn RemoteStore>,
    config: &TransferConfig,
    root_id: &str,
    cancel: CancellationToken,
) -> Result<Inventory> {
    config.validate()?;
    let walk = RemoteTreeWalker::from_config(source, config)?
        .with_cancellation(cancel)
        .walk(root_id)
        .await;
    let inventory = Inventory::from_walk(&walk);
    info!(
        files = inventory.files,
        folders = inventory.folders,
        bytes = inventory.total_bytes,
        "Listing finished"
    );
    Ok(inventory)
}

/// Writes `inventory` to the configured file, creating parent directories
pub fn export_inventory(inventory: &Inventory, output: &MetadataOutput) -> Result<()> {
    let mut sink = create_sink(output)?;
    inventory.write(output.format, &mut sink)?;
    info!(
        path = %output.path.display(),
        format = output.format.extension(),
        entries = inventory.entries.len(),
        "Inventory exported"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::LocalFolderStore;
    use tempfile::TempDir;

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b/d")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();
        std::fs::write(dir.path().join("b/c.txt"), vec![1u8; 20]).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        std::fs::write(dir.path().join("node_modules/x/i.js"), b"js").unwrap();
        dir
    }

    async fn list(dir: &TempDir) -> Inventory {
        let source: Arc<dyn RemoteStore> = Arc::new(LocalFolderStore::new(dir.path()));
        list_tree(
            source,
            &TransferConfig::default(),
            LocalFolderStore::ROOT_ID,
            CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[core_async::test]
    async fn test_inventory_lists_files_and_folders_without_writing() {
        let tree = sample_tree();

        let inventory = list(&tree).await;

        let paths: Vec<_> = inventory.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b", "b/c.txt", "b/d"]);
        assert_eq!(inventory.files, 2);
        assert_eq!(inventory.folders, 2);
        assert_eq!(inventory.total_bytes, 30);
        assert_eq!(inventory.entries[1].kind, NodeKind::Folder);
        assert_eq!(inventory.entries[1].size, None);
        assert!(inventory.is_complete());
        assert_eq!(inventory.warnings.len(), 1);
    }

    #[core_async::test]
    async fn test_inventory_csv_and_json() {
        let tree = sample_tree();
        let reports = TempDir::new().unwrap();
        let inventory = list(&tree).await;

        let csv_output = MetadataOutput::new(reports.path().join("listing/tree.csv"));
        export_inventory(&inventory, &csv_output).unwrap();
        let csv = std::fs::read_to_string(&csv_output.path).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), InventoryEntry::COLUMNS.join(","));
        assert!(lines.next().unwrap().starts_with("a.txt,a.txt,file,,10,"));
        assert!(lines.next().unwrap().starts_with("b,b,folder,,,"));
        assert_eq!(lines.count(), 2);

        let json_output = MetadataOutput::new(reports.path().join("tree.json"));
        export_inventory(&inventory, &json_output).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&json_output.path).unwrap()).unwrap();
        assert_eq!(json["files"], 2);
        assert_eq!(json["entries"].as_array().unwrap().len(), 4);
        assert_eq!(json["entries"][2]["path"], "b/c.txt");
        assert!(json.get("cancelled").is_none());
    }

    #[core_async::test]
    async fn test_cancelled_listing_is_incomplete() {
        let tree = sample_tree();
        let source: Arc<dyn RemoteStore> = Arc::new(LocalFolderStore::new(tree.path()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let inventory = list_tree(source, &TransferConfig::default(), ".", cancel)
            .await
            .unwrap();

        assert!(inventory.cancelled);
        assert!(!inventory.is_complete());
        assert!(inventory.entries.is_empty());
    }
}
