//! Local directory exposed as a [`RemoteStore`]
//!
//! Node identifiers are paths relative to the store root using `/` separators;
//! the root itself is [`LocalFolderStore::ROOT_ID`].
//!
//! A symlinked directory is reported under the id of its canonical target, so
//! a link back to an ancestor shows up as an already visited folder instead of
//! an endless path. Links that resolve outside the root are not listed.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, PermanentReason, Result},
    storage::{ExportFormat, NodeKind, RemoteNode, RemoteStore},
};
use bytes::Bytes;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, instrument, warn};

const DEFAULT_PAGE_SIZE: usize = 200;

/// Tokio-backed store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalFolderStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalFolderStore {
    pub const ROOT_ID: &'static str = ".";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a node id onto a path below the root, rejecting escapes
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        if id == Self::ROOT_ID || id.is_empty() {
            return Ok(self.root.clone());
        }
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(BridgeError::permanent(
                PermanentReason::Other,
                format!("node id escapes store root: {}", id),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn child_id(parent_id: &str, name: &str) -> String {
        if parent_id == Self::ROOT_ID || parent_id.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent_id.trim_end_matches('/'), name)
        }
    }

    fn parent_of(id: &str) -> Option<String> {
        if id == Self::ROOT_ID {
            return None;
        }
        Some(match id.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => Self::ROOT_ID.to_string(),
        })
    }

    /// Make a store-provided name safe to use as a single path component
    pub fn sanitize_name(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                other => other,
            })
            .collect();
        match cleaned.as_str() {
            "" => "_".to_string(),
            "." | ".." => format!("_{}", cleaned),
            _ => cleaned,
        }
    }

    async fn node_for(&self, id: String, path: &Path) -> Result<RemoteNode> {
        let metadata = fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| Self::ROOT_ID.to_string());
        let kind = if metadata.is_dir() {
            NodeKind::Folder
        } else {
            NodeKind::File
        };

        Ok(RemoteNode {
            parent_ids: Self::parent_of(&id).into_iter().collect(),
            id,
            name,
            kind,
            mime_type: None,
            size: (kind == NodeKind::File).then(|| metadata.len()),
            created_at: metadata.created().ok().and_then(unix_seconds),
            modified_at: metadata.modified().ok().and_then(unix_seconds),
            owner: None,
        })
    }

    /// Node for one directory entry, or `None` when the entry is skipped
    async fn entry_node(
        &self,
        folder_id: &str,
        path: &Path,
        canonical_root: &Path,
    ) -> Result<Option<RemoteNode>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = Self::child_id(folder_id, &name);

        if !fs::symlink_metadata(path).await?.file_type().is_symlink() {
            return self.node_for(id, path).await.map(Some);
        }

        let target = match fs::canonicalize(path).await {
            Ok(target) => target,
            Err(e) => {
                debug!(link = %id, error = %e, "Skipping dangling symlink");
                return Ok(None);
            }
        };
        let Ok(inside) = target.strip_prefix(canonical_root) else {
            warn!(link = %id, target = %target.display(), "Skipping symlink that leaves the store root");
            return Ok(None);
        };
        if !fs::metadata(&target).await?.is_dir() {
            return self.node_for(id, path).await.map(Some);
        }

        let canonical_id = relative_id(inside);
        let mut node = self.node_for(canonical_id, &target).await?;
        node.name = name;
        node.parent_ids = vec![folder_id.to_string()];
        Ok(Some(node))
    }
}

/// `a/b/c` form of a path below the root
fn relative_id(relative: &Path) -> String {
    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        LocalFolderStore::ROOT_ID.to_string()
    } else {
        segments.join("/")
    }
}

/// Writes `data` to a hidden temp file beside `target` and moves it into place
/// without replacing an existing entry. The temp file is removed on every
/// failure path.
fn publish(target: &Path, data: &[u8]) -> Result<()> {
    let (Some(dir), Some(name)) = (target.parent(), target.file_name()) else {
        return Err(BridgeError::permanent(
            PermanentReason::Other,
            format!("invalid upload target: {}", target.display()),
        ));
    };

    let mut staged = tempfile::Builder::new()
        .prefix(&format!(".{}.", name.to_string_lossy()))
        .suffix(".partial")
        .tempfile_in(dir)?;
    staged.write_all(data)?;
    staged.as_file_mut().flush()?;

    staged.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            BridgeError::permanent(
                PermanentReason::Conflict,
                format!("{} already exists", target.display()),
            )
        } else {
            e.error.into()
        }
    })?;
    Ok(())
}

fn unix_seconds(time: SystemTime) -> Option<i64> {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs() as i64)
}

#[async_trait]
impl RemoteStore for LocalFolderStore {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteNode>, Option<String>)> {
        let dir = self.resolve(folder_id)?;
        let offset = match page_token.as_deref() {
            Some(token) => token.parse::<usize>().map_err(|_| {
                BridgeError::permanent(
                    PermanentReason::Other,
                    format!("invalid page token: {}", token),
                )
            })?,
            None => 0,
        };

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let canonical_root = fs::canonicalize(&self.root).await?;
        let page: Vec<_> = names.iter().skip(offset).take(self.page_size).collect();
        let mut nodes = Vec::with_capacity(page.len());
        for name in &page {
            if let Some(node) = self.entry_node(folder_id, &dir.join(name), &canonical_root).await? {
                nodes.push(node);
            }
        }

        let next = offset + page.len();
        let next_token = (next < names.len()).then(|| next.to_string());
        debug!(count = nodes.len(), has_more = next_token.is_some(), "Listed local folder");
        Ok((nodes, next_token))
    }

    async fn get_metadata(&self, node_id: &str) -> Result<RemoteNode> {
        let path = self.resolve(node_id)?;
        self.node_for(node_id.to_string(), &path).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        let id = Self::child_id(parent_id, &Self::sanitize_name(name));
        let path = self.resolve(&id)?;

        match fs::create_dir(&path).await {
            Ok(()) => Ok(id),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if fs::metadata(&path).await?.is_dir() {
                    Ok(id)
                } else {
                    Err(BridgeError::permanent(
                        PermanentReason::Conflict,
                        format!("a file named {} already exists", id),
                    ))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_child_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>> {
        let id = Self::child_id(parent_id, &Self::sanitize_name(name));
        let path = self.resolve(&id)?;

        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => Ok(Some(id)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn download(&self, node_id: &str) -> Result<Bytes> {
        let path = self.resolve(node_id)?;
        Ok(Bytes::from(fs::read(&path).await?))
    }

    async fn export_as(&self, node_id: &str, format: &ExportFormat) -> Result<Bytes> {
        Err(BridgeError::unsupported(format!(
            "local files cannot be exported ({} as {})",
            node_id, format.mime_type
        )))
    }

    #[instrument(skip(self, data), fields(bytes = data.len()), level = "debug")]
    async fn upload(&self, parent_id: &str, name: &str, data: Bytes) -> Result<RemoteNode> {
        let id = Self::child_id(parent_id, &Self::sanitize_name(name));
        let path = self.resolve(&id)?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || publish(&target, &data))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("upload task failed: {e}")))??;

        self.node_for(id, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalFolderStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalFolderStore::new(dir.path());
        (dir, store)
    }

    #[core_async::test]
    async fn test_create_find_and_upload() {
        let (_dir, store) = store();

        assert_eq!(store.find_child_folder(".", "b").await.unwrap(), None);
        let folder = store.create_folder(".", "b").await.unwrap();
        assert_eq!(folder, "b");
        assert_eq!(
            store.find_child_folder(".", "b").await.unwrap(),
            Some("b".to_string())
        );

        let node = store
            .upload(&folder, "c.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(node.id, "b/c.txt");
        assert_eq!(node.size, Some(5));
        assert_eq!(node.parent_ids, vec!["b".to_string()]);
        assert_eq!(store.download("b/c.txt").await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[core_async::test]
    async fn test_create_folder_is_idempotent() {
        let (_dir, store) = store();
        let first = store.create_folder(".", "x").await.unwrap();
        let second = store.create_folder(".", "x").await.unwrap();
        assert_eq!(first, second);
    }

    #[core_async::test]
    async fn test_create_folder_over_file_conflicts() {
        let (_dir, store) = store();
        store
            .upload(".", "x", Bytes::from_static(b"file"))
            .await
            .unwrap();

        let error = store.create_folder(".", "x").await.unwrap_err();
        assert_eq!(error.permanent_reason(), Some(PermanentReason::Conflict));
        assert_eq!(store.find_child_folder(".", "x").await.unwrap(), None);
    }

    #[core_async::test]
    async fn test_list_children_paginates_in_name_order() {
        let (_dir, store) = store();
        let store = store.with_page_size(2);
        for name in ["c", "a", "b"] {
            store
                .upload(".", name, Bytes::from_static(b"1"))
                .await
                .unwrap();
        }

        let (first, token) = store.list_children(".", None).await.unwrap();
        let names: Vec<_> = first.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(token.as_deref(), Some("2"));

        let (second, token) = store.list_children(".", token).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "c");
        assert!(token.is_none());
    }

    #[core_async::test]
    async fn test_missing_node_is_permanent() {
        let (_dir, store) = store();
        let error = store.download("nope.txt").await.unwrap_err();
        assert!(!error.is_retryable());
        assert_eq!(error.permanent_reason(), Some(PermanentReason::NotFound));
    }

    #[core_async::test]
    async fn test_rejects_ids_escaping_root() {
        let (_dir, store) = store();
        let error = store.download("../etc/passwd").await.unwrap_err();
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(LocalFolderStore::sanitize_name("a/b"), "a_b");
        assert_eq!(LocalFolderStore::sanitize_name(".."), "_..");
        assert_eq!(LocalFolderStore::sanitize_name("report.pdf"), "report.pdf");
    }

    #[core_async::test]
    async fn test_export_is_unsupported() {
        let (_dir, store) = store();
        let format = ExportFormat::new("application/pdf", ".pdf");
        let error = store.export_as("a", &format).await.unwrap_err();
        assert_eq!(error.permanent_reason(), Some(PermanentReason::Unsupported));
    }

    fn entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[core_async::test]
    async fn test_upload_onto_directory_conflicts_and_cleans_up() {
        let (dir, store) = store();
        std::fs::create_dir(dir.path().join("a.txt")).unwrap();

        let error = store
            .upload(".", "a.txt", Bytes::from_static(b"data"))
            .await
            .unwrap_err();

        assert!(!error.is_retryable());
        assert_eq!(error.permanent_reason(), Some(PermanentReason::Conflict));
        assert_eq!(entries(&dir), vec!["a.txt".to_string()]);
        assert!(dir.path().join("a.txt").is_dir());
    }

    #[core_async::test]
    async fn test_upload_into_missing_folder_leaves_nothing() {
        let (dir, store) = store();

        let error = store
            .upload("gone", "a.txt", Bytes::from_static(b"data"))
            .await
            .unwrap_err();

        assert_eq!(error.permanent_reason(), Some(PermanentReason::NotFound));
        assert!(entries(&dir).is_empty());
    }

    #[core_async::test]
    async fn test_same_name_upload_keeps_first_write() {
        let (dir, store) = store();
        store
            .upload(".", "dup.txt", Bytes::from_static(b"first"))
            .await
            .unwrap();

        let error = store
            .upload(".", "dup.txt", Bytes::from_static(b"second"))
            .await
            .unwrap_err();

        assert_eq!(error.permanent_reason(), Some(PermanentReason::Conflict));
        assert_eq!(store.download("dup.txt").await.unwrap(), Bytes::from_static(b"first"));
        assert_eq!(entries(&dir), vec!["dup.txt".to_string()]);
    }

    #[core_async::test]
    async fn test_concurrent_same_name_uploads_write_once() {
        let (dir, store) = store();
        let uploads = (0..8u8).map(|i| {
            let store = store.clone();
            core_async::spawn(async move {
                store.upload(".", "race.bin", Bytes::from(vec![i; 1024])).await
            })
        });

        let mut ok = 0;
        for handle in uploads.collect::<Vec<_>>() {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert_eq!(e.permanent_reason(), Some(PermanentReason::Conflict)),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(entries(&dir), vec!["race.bin".to_string()]);
        let data = store.download("race.bin").await.unwrap();
        assert!(data.iter().all(|b| *b == data[0]));
    }

    #[cfg(unix)]
    #[core_async::test]
    async fn test_symlink_to_ancestor_uses_canonical_id() {
        let (dir, store) = store();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/f.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("a/loop")).unwrap();

        let (children, _) = store.list_children("a", None).await.unwrap();

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "f.txt");
        assert_eq!(children[0].id, "a/f.txt");
        assert_eq!(children[1].name, "loop");
        assert_eq!(children[1].id, "a");
        assert!(children[1].is_folder());
        assert_eq!(children[1].parent_ids, vec!["a".to_string()]);
    }

    #[cfg(unix)]
    #[core_async::test]
    async fn test_symlink_leaving_root_is_not_listed() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"s").unwrap();
        let (dir, store) = store();
        std::fs::write(dir.path().join("kept.txt"), b"k").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling")).unwrap();

        let (children, token) = store.list_children(".", None).await.unwrap();

        let names: Vec<_> = children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["kept.txt"]);
        assert!(token.is_none());
    }
}
