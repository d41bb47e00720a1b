//! # Transfer Items
//!
//! Leaf items produced by the walk and the per-item state machine.
//!
//! ## State Machine
//!
//! ```text
//! Pending → FolderResolving → Fetching → (Converting) → Writing → Succeeded
//!    ↓             ↓              ↓            ↓            ↓
//!    └─────────────┴──────────────┴──── Failed ┴────────────┘
//! ```
//!
//! `Succeeded` and `Failed` are terminal.

use crate::error::{Result, TransferError};
use bridge_traits::storage::{ExportFormat, RemoteNode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Folder names from the traversal root down to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelativePath(Vec<String>);

impl RelativePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Split a `/`-separated path, ignoring empty segments
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/').filter(|s| !s.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with `name` appended
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// The first `len` segments
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Path of `name` inside this folder, joined with `/`
    pub fn join_name(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}/{}", self, name)
        }
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// A leaf node queued for transfer
///
/// Created during the walk and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    pub node: RemoteNode,
    /// Folder containing the node, relative to the walk root
    pub parent_path: RelativePath,
    /// Export target for store-native documents; `None` for plain files and
    /// for documents whose kind has no export mapping
    pub export: Option<ExportFormat>,
    /// Name written at the destination
    pub target_name: String,
}

impl TransferItem {
    pub fn new(node: RemoteNode, parent_path: RelativePath, export: Option<ExportFormat>) -> Self {
        let target_name = match &export {
            Some(format) => format.exported_name(&node.name),
            None => node.name.clone(),
        };
        Self {
            node,
            parent_path,
            export,
            target_name,
        }
    }

    /// Path of the source node relative to the walk root
    pub fn source_path(&self) -> String {
        self.parent_path.join_name(&self.node.name)
    }

    /// Path written under the destination root
    pub fn destination_path(&self) -> String {
        self.parent_path.join_name(&self.target_name)
    }

    pub fn is_export(&self) -> bool {
        self.export.is_some()
    }
}

/// Pipeline state of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemState {
    Pending,
    FolderResolving,
    Fetching,
    Converting,
    Writing,
    Succeeded,
    Failed,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::FolderResolving => "folder-resolving",
            ItemState::Fetching => "fetching",
            ItemState::Converting => "converting",
            ItemState::Writing => "writing",
            ItemState::Succeeded => "succeeded",
            ItemState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Failed)
    }

    pub fn can_transition_to(&self, next: ItemState) -> bool {
        use ItemState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, FolderResolving)
            | (FolderResolving, Fetching)
            | (Fetching, Converting)
            | (Fetching, Writing)
            | (Converting, Writing)
            | (Writing, Succeeded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemState {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ItemState::Pending),
            "folder-resolving" => Ok(ItemState::FolderResolving),
            "fetching" => Ok(ItemState::Fetching),
            "converting" => Ok(ItemState::Converting),
            "writing" => Ok(ItemState::Writing),
            "succeeded" => Ok(ItemState::Succeeded),
            "failed" => Ok(ItemState::Failed),
            other => Err(TransferError::InvalidStateTransition {
                from: other.to_string(),
                to: "unknown".to_string(),
            }),
        }
    }
}

/// Tracks the state of one item through the pipeline
#[derive(Debug, Clone)]
pub struct ItemLifecycle {
    state: ItemState,
}

impl ItemLifecycle {
    pub fn new() -> Self {
        Self {
            state: ItemState::Pending,
        }
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn advance(&mut self, next: ItemState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(TransferError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Mark the item failed unless it already reached a terminal state
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = ItemState::Failed;
        }
    }
}

impl Default for ItemLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
