//! Remote Store Abstractions
//!
//! Defines the capability contract every transfer endpoint implements, whether
//! it is a cloud document store or a directory on the local disk.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Kind of a node in a remote tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Plain file whose bytes can be downloaded as-is
    File,
    /// Container of other nodes
    Folder,
    /// Store-native document that must be exported to a portable format
    ExportableDocument,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
            NodeKind::ExportableDocument => "exportable-document",
        }
    }

    /// Whether nodes of this kind are transferred as leaf items
    pub fn is_transferable(&self) -> bool {
        matches!(self, NodeKind::File | NodeKind::ExportableDocument)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a node fetched from a store
///
/// Immutable once listed; timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Store-specific opaque identifier
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    /// Native MIME type reported by the store (drives export for documents)
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub parent_ids: Vec<String>,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub owner: Option<String>,
}

impl RemoteNode {
    /// Minimal file node, mostly useful for adapters and tests
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::File,
            mime_type: None,
            size: Some(size),
            parent_ids: Vec::new(),
            created_at: None,
            modified_at: None,
            owner: None,
        }
    }

    /// Minimal folder node
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Folder,
            mime_type: None,
            size: None,
            parent_ids: Vec::new(),
            created_at: None,
            modified_at: None,
            owner: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_ids.push(parent_id.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// Target format for exporting a store-native document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportFormat {
    /// MIME type requested from the store
    pub mime_type: String,
    /// File extension (with leading dot) appended to the exported name
    pub extension: String,
}

impl ExportFormat {
    pub fn new(mime_type: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            extension: extension.into(),
        }
    }

    /// File name for the exported document, appending the extension when missing
    pub fn exported_name(&self, name: &str) -> String {
        if name.ends_with(&self.extension) {
            name.to_string()
        } else {
            format!("{}{}", name, self.extension)
        }
    }
}

/// Capability contract for one side of a transfer
///
/// Every call may fail with a retryable or permanent
/// [`BridgeError`](crate::error::BridgeError); callers decide whether to retry
/// via [`BridgeError::is_retryable`](crate::error::BridgeError::is_retryable).
/// Implementations must not retry internally beyond a single request.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::RemoteStore;
///
/// async fn count_children(store: &dyn RemoteStore, folder_id: &str) -> Result<usize> {
///     let mut total = 0;
///     let mut token = None;
///     loop {
///         let (nodes, next) = store.list_children(folder_id, token).await?;
///         total += nodes.len();
///         match next {
///             Some(t) => token = Some(t),
///             None => return Ok(total),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short name used in logs and audit records (e.g. `gdrive`, `local`)
    fn name(&self) -> &str;

    /// List one page of the direct children of a folder
    ///
    /// Returns the nodes and the continuation token for the next page, if any.
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteNode>, Option<String>)>;

    /// Fetch metadata for a single node
    async fn get_metadata(&self, node_id: &str) -> Result<RemoteNode>;

    /// Create a child folder and return its identifier
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String>;

    /// Find an existing child folder by exact name
    async fn find_child_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>>;

    /// Download the raw bytes of a file
    async fn download(&self, node_id: &str) -> Result<Bytes>;

    /// Export a store-native document into the requested format
    async fn export_as(&self, node_id: &str, format: &ExportFormat) -> Result<Bytes>;

    /// Write a new file under `parent_id` and return the created node
    async fn upload(&self, parent_id: &str, name: &str, data: Bytes) -> Result<RemoteNode>;
}
