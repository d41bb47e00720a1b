//! # Remote Tree Walker
//!
//! Enumerates everything reachable under a source folder before any transfer
//! starts. The walk is pure discovery: it never creates anything.
//!
//! ## Behaviour
//!
//! - Breadth-first over an explicit queue, so depth is bounded only by memory
//! - Every listing is paginated until the store stops returning a token
//! - A folder id is expanded at most once, even when it appears under several
//!   parents or in a cycle
//! - A listing that still fails after retries becomes a [`FailedSubtree`] and
//!   the walk carries on with the siblings
//! - Store-native documents get their export format from [`ExportTable`];
//!   unknown kinds are reported as [`WalkWarning::UnsupportedKind`] and still
//!   emitted so the pool can record them

use crate::error::{Result, TransferError};
use crate::item::{RelativePath, TransferItem};
use crate::retry::RetryPolicy;
use bridge_traits::storage::{ExportFormat, NodeKind, RemoteNode, RemoteStore};
use core_async::sync::CancellationToken;
use core_runtime::config::TransferConfig;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";
pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
pub const PRESENTATION_MIME_TYPE: &str = "application/vnd.google-apps.presentation";
pub const DRAWING_MIME_TYPE: &str = "application/vnd.google-apps.drawing";
pub const SCRIPT_MIME_TYPE: &str = "application/vnd.google-apps.script";
pub const FORM_MIME_TYPE: &str = "application/vnd.google-apps.form";

/// Native document MIME type → export format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    formats: BTreeMap<String, ExportFormat>,
}

impl ExportTable {
    pub fn empty() -> Self {
        Self {
            formats: BTreeMap::new(),
        }
    }

    /// Built-in table layered with the configured overrides
    pub fn from_config(config: &TransferConfig) -> Self {
        let mut table = Self::default();
        for (source, format) in &config.export_overrides {
            table.insert(source.clone(), format.clone());
        }
        table
    }

    pub fn insert(&mut self, source_mime_type: impl Into<String>, format: ExportFormat) {
        self.formats.insert(source_mime_type.into(), format);
    }

    pub fn lookup(&self, source_mime_type: &str) -> Option<&ExportFormat> {
        self.formats.get(source_mime_type)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl Default for ExportTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert(
            DOCUMENT_MIME_TYPE,
            ExportFormat::new(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                ".docx",
            ),
        );
        table.insert(
            SPREADSHEET_MIME_TYPE,
            ExportFormat::new(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ".xlsx",
            ),
        );
        table.insert(
            PRESENTATION_MIME_TYPE,
            ExportFormat::new(
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                ".pptx",
            ),
        );
        table.insert(DRAWING_MIME_TYPE, ExportFormat::new("application/pdf", ".pdf"));
        table.insert(
            SCRIPT_MIME_TYPE,
            ExportFormat::new("application/vnd.google-apps.script+json", ".json"),
        );
        table.insert(FORM_MIME_TYPE, ExportFormat::new("application/zip", ".zip"));
        table
    }
}

/// Node names skipped during the walk
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    set: GlobSet,
}

impl ExcludeMatcher {
    /// Build from exact names or glob patterns such as `*.tmp`
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| {
                TransferError::Config(core_runtime::Error::Config(format!(
                    "Invalid exclude pattern '{}': {}",
                    pattern, e
                )))
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| {
            TransferError::Config(core_runtime::Error::Config(format!(
                "Failed to build exclude set: {}",
                e
            )))
        })?;
        Ok(Self { set })
    }

    pub fn none() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.set.is_match(name)
    }
}

/// Non-fatal observation made during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkWarning {
    /// A store-native document with no export mapping
    UnsupportedKind { path: String, mime_type: String },
    /// A node skipped by an exclude pattern
    Excluded { path: String },
    /// A folder reached again through another parent
    DuplicateFolder { id: String, path: String },
}

impl std::fmt::Display for WalkWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkWarning::UnsupportedKind { path, mime_type } => {
                write!(f, "{}: no export format for {}", path, mime_type)
            }
            WalkWarning::Excluded { path } => write!(f, "{}: excluded", path),
            WalkWarning::DuplicateFolder { id, path } => {
                write!(f, "{}: folder {} already visited", path, id)
            }
        }
    }
}

/// A folder whose listing could not be completed
#[derive(Debug)]
pub struct FailedSubtree {
    pub path: RelativePath,
    pub folder_id: String,
    pub error: TransferError,
}

/// Everything the walk discovered
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Leaf items in discovery order
    pub items: Vec<TransferItem>,
    /// Every node listed, folders included
    pub nodes: Vec<RemoteNode>,
    /// Folder id → path relative to the root (the root maps to the empty path)
    pub folder_paths: HashMap<String, RelativePath>,
    pub failed_subtrees: Vec<FailedSubtree>,
    pub warnings: Vec<WalkWarning>,
    /// The walk stopped early on a cancel signal
    pub cancelled: bool,
}

impl WalkResult {
    pub fn folder_count(&self) -> usize {
        self.folder_paths.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| !matches!(w, WalkWarning::DuplicateFolder { .. }))
            .count()
    }
}

/// Enumerates a source tree
pub struct RemoteTreeWalker {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    exports: ExportTable,
    excludes: ExcludeMatcher,
    cancel: Option<CancellationToken>,
}

impl RemoteTreeWalker {
    pub fn new(store: Arc<dyn RemoteStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            exports: ExportTable::default(),
            excludes: ExcludeMatcher::none(),
            cancel: None,
        }
    }

    /// Walker with the retry policy, export overrides and exclude patterns of `config`
    pub fn from_config(store: Arc<dyn RemoteStore>, config: &TransferConfig) -> Result<Self> {
        Ok(Self::new(store, RetryPolicy::from_config(config))
            .with_exports(ExportTable::from_config(config))
            .with_excludes(ExcludeMatcher::new(config.exclude_patterns.as_slice())?))
    }

    pub fn with_exports(mut self, exports: ExportTable) -> Self {
        self.exports = exports;
        self
    }

    pub fn with_excludes(mut self, excludes: ExcludeMatcher) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[instrument(skip(self), fields(store = self.store.name()))]
    pub async fn walk(&self, root_id: &str) -> WalkResult {
        let mut result = WalkResult::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, RelativePath)> = VecDeque::new();

        visited.insert(root_id.to_string());
        result
            .folder_paths
            .insert(root_id.to_string(), RelativePath::root());
        queue.push_back((root_id.to_string(), RelativePath::root()));

        while let Some((folder_id, path)) = queue.pop_front() {
            if self.cancel.as_ref().map_or(false, |t| t.is_cancelled()) {
                info!(pending_folders = queue.len() + 1, "Walk cancelled");
                result.cancelled = true;
                break;
            }

            let children = match self.list_all(&folder_id).await {
                Ok(children) => children,
                Err(TransferError::Cancelled) => {
                    info!(folder = %path, "Walk cancelled during listing");
                    result.cancelled = true;
                    break;
                }
                Err(error) => {
                    warn!(folder = %path, folder_id = %folder_id, error = %error, "Listing failed; skipping subtree");
                    result.failed_subtrees.push(FailedSubtree {
                        path,
                        folder_id,
                        error,
                    });
                    continue;
                }
            };

            for node in children {
                let node_path = path.join_name(&node.name);
                if self.excludes.is_excluded(&node.name) {
                    debug!(path = %node_path, "Excluded");
                    result.warnings.push(WalkWarning::Excluded { path: node_path });
                    continue;
                }

                match node.kind {
                    NodeKind::Folder => {
                        if !visited.insert(node.id.clone()) {
                            debug!(path = %node_path, id = %node.id, "Folder already visited");
                            result.warnings.push(WalkWarning::DuplicateFolder {
                                id: node.id.clone(),
                                path: node_path,
                            });
                        } else {
                            let child_path = path.child(node.name.clone());
                            result
                                .folder_paths
                                .insert(node.id.clone(), child_path.clone());
                            queue.push_back((node.id.clone(), child_path));
                        }
                    }
                    NodeKind::ExportableDocument => {
                        let mime_type = node.mime_type.clone().unwrap_or_default();
                        let export = self.exports.lookup(&mime_type).cloned();
                        if export.is_none() {
                            warn!(path = %node_path, mime_type = %mime_type, "No export format for document kind");
                            result.warnings.push(WalkWarning::UnsupportedKind {
                                path: node_path,
                                mime_type,
                            });
                        }
                        result
                            .items
                            .push(TransferItem::new(node.clone(), path.clone(), export));
                    }
                    NodeKind::File => {
                        result
                            .items
                            .push(TransferItem::new(node.clone(), path.clone(), None));
                    }
                }
                result.nodes.push(node);
            }
        }

        info!(
            items = result.items.len(),
            folders = result.folder_count(),
            failed_subtrees = result.failed_subtrees.len(),
            "Walk completed"
        );
        result
    }

    /// All pages of one folder; each page request is retried on its own
    async fn list_all(&self, folder_id: &str) -> Result<Vec<RemoteNode>> {
        let mut nodes = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.take();
            let (outcome, _) = self
                .retry
                .run("list_children", self.cancel.as_ref(), || {
                    self.store.list_children(folder_id, token.clone())
                })
                .await;
            let (page, next) = outcome?;
            nodes.extend(page);

            match next {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => return Ok(nodes),
            }
        }
    }
}
