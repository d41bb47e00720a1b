//! S3 bucket connector implementation
//!
//! Implements the `RemoteStore` trait over key prefixes.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::{ExportFormat, NodeKind, RemoteNode, RemoteStore};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::{ObjectClient, S3Options};
use crate::types::{normalize_prefix, ObjectInfo, S3Location};

/// `ListObjectsV2` returns at most this many keys per page
const MAX_PAGE_SIZE: i32 = 1000;

/// Store over one bucket
///
/// Node ids are object keys for files and prefixes ending in `/` for
/// folders; the empty prefix is the bucket root.
///
/// # Example
///
/// ```ignore
/// use provider_s3::{S3Location, S3Options, S3Store};
///
/// let location: S3Location = "s3://backups/photos".parse()?;
/// let store = S3Store::connect(&S3Options::default(), &location.bucket).await;
/// let (children, next_page) = store.list_children(&location.prefix, None).await?;
/// ```
pub struct S3Store {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    page_size: i32,
}

impl S3Store {
    pub fn new(client: Arc<dyn ObjectClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Builds an SDK client from `options` and wraps it
    pub async fn connect(options: &S3Options, bucket: impl Into<String>) -> Self {
        Self::new(Arc::new(options.connect().await), bucket)
    }

    /// Store plus the folder id a location points at
    pub async fn open(options: &S3Options, location: &S3Location) -> (Self, String) {
        let store = Self::connect(options, location.bucket.clone()).await;
        (store, location.prefix.clone())
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Keys cannot hold a name with `/` as one segment
    fn key_segment(name: &str) -> String {
        let cleaned = name.replace('/', "_");
        if cleaned.is_empty() {
            "_".to_string()
        } else {
            cleaned
        }
    }

    fn child_prefix(parent_id: &str, name: &str) -> String {
        format!("{}{}/", normalize_prefix(parent_id), Self::key_segment(name))
    }

    /// Last segment of a key or prefix
    fn leaf_name(id: &str) -> &str {
        let trimmed = id.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Prefix one level up, `""` for top-level entries
    fn parent_prefix(id: &str) -> String {
        let trimmed = id.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/"),
            None => String::new(),
        }
    }

    fn folder_node(prefix: &str, parent_id: &str) -> RemoteNode {
        RemoteNode::folder(prefix, Self::leaf_name(prefix)).with_parent(parent_id)
    }

    fn file_node(object: ObjectInfo, parent_id: &str) -> RemoteNode {
        RemoteNode {
            name: Self::leaf_name(&object.key).to_string(),
            id: object.key,
            kind: NodeKind::File,
            mime_type: object.content_type,
            size: object.size,
            parent_ids: vec![parent_id.to_string()],
            created_at: None,
            modified_at: object.last_modified,
            owner: object.owner,
        }
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    #[instrument(skip(self), fields(bucket = %self.bucket), level = "debug")]
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteNode>, Option<String>)> {
        let prefix = normalize_prefix(folder_id);
        let page = self
            .client
            .list_page(&self.bucket, &prefix, page_token, self.page_size)
            .await?;

        let mut nodes = Vec::with_capacity(page.prefixes.len() + page.objects.len());
        for child in &page.prefixes {
            if child.len() > prefix.len() + 1 {
                nodes.push(Self::folder_node(child, folder_id));
            }
        }
        for object in page.objects {
            // Folder markers written by consoles and other tools
            if object.key == prefix || object.key.ends_with('/') {
                continue;
            }
            nodes.push(Self::file_node(object, folder_id));
        }

        debug!(count = nodes.len(), has_more = page.next_token.is_some(), "Listed prefix");
        Ok((nodes, page.next_token))
    }

    async fn get_metadata(&self, node_id: &str) -> Result<RemoteNode> {
        let parent = Self::parent_prefix(node_id);
        if node_id.is_empty() || node_id.ends_with('/') {
            return Ok(Self::folder_node(node_id, &parent));
        }
        let object = self.client.head(&self.bucket, node_id).await?;
        Ok(Self::file_node(object, &parent))
    }

    /// Prefixes exist as soon as a key is written under them
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        Ok(Self::child_prefix(parent_id, name))
    }

    async fn find_child_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>> {
        let prefix = Self::child_prefix(parent_id, name);
        let page = self.client.list_page(&self.bucket, &prefix, None, 1).await?;
        let exists = !page.objects.is_empty() || !page.prefixes.is_empty();
        Ok(exists.then_some(prefix))
    }

    #[instrument(skip(self), fields(bucket = %self.bucket), level = "debug")]
    async fn download(&self, node_id: &str) -> Result<Bytes> {
        Ok(self.client.get(&self.bucket, node_id).await?)
    }

    async fn export_as(&self, node_id: &str, format: &ExportFormat) -> Result<Bytes> {
        Err(BridgeError::unsupported(format!(
            "S3 objects cannot be exported ({} as {})",
            node_id, format.mime_type
        )))
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket, bytes = data.len()), level = "debug")]
    async fn upload(&self, parent_id: &str, name: &str, data: Bytes) -> Result<RemoteNode> {
        let key = format!("{}{}", normalize_prefix(parent_id), Self::key_segment(name));
        let size = data.len() as u64;
        self.client.put(&self.bucket, &key, data).await?;

        Ok(RemoteNode::file(key, Self::key_segment(name), size).with_parent(parent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::S3Error;
    use crate::types::ListPage;
    use bridge_traits::error::PermanentReason;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Objects {}

        #[async_trait]
        impl ObjectClient for Objects {
            async fn list_page(
                &self,
                bucket: &str,
                prefix: &str,
                continuation_token: Option<String>,
                max_keys: i32,
            ) -> crate::error::Result<ListPage>;
            async fn head(&self, bucket: &str, key: &str) -> crate::error::Result<ObjectInfo>;
            async fn get(&self, bucket: &str, key: &str) -> crate::error::Result<Bytes>;
            async fn put(&self, bucket: &str, key: &str, data: Bytes) -> crate::error::Result<()>;
        }
    }

    fn store(objects: MockObjects) -> S3Store {
        S3Store::new(Arc::new(objects), "bucket")
    }

    fn object(key: &str, size: u64) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: Some(size),
            last_modified: Some(1_700_000_000),
            content_type: None,
            owner: Some("ops".to_string()),
        }
    }

    #[core_async::test]
    async fn test_list_children_maps_prefixes_and_objects() {
        let mut objects = MockObjects::new();
        objects
            .expect_list_page()
            .withf(|bucket, prefix, token, max_keys| {
                bucket == "bucket"
                    && prefix == "photos/"
                    && token.as_deref() == Some("page2")
                    && *max_keys == MAX_PAGE_SIZE
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(ListPage {
                    objects: vec![
                        object("photos/", 0),
                        object("photos/a.jpg", 10),
                        object("photos/empty/", 0),
                    ],
                    prefixes: vec!["photos/2024/".to_string()],
                    next_token: Some("page3".to_string()),
                })
            });

        let (nodes, next) = store(objects)
            .list_children("photos/", Some("page2".to_string()))
            .await
            .unwrap();

        assert_eq!(next.as_deref(), Some("page3"));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "photos/2024/");
        assert_eq!(nodes[0].name, "2024");
        assert!(nodes[0].is_folder());
        assert_eq!(nodes[1].id, "photos/a.jpg");
        assert_eq!(nodes[1].name, "a.jpg");
        assert_eq!(nodes[1].size, Some(10));
        assert_eq!(nodes[1].modified_at, Some(1_700_000_000));
        assert_eq!(nodes[1].parent_ids, vec!["photos/".to_string()]);
    }

    #[core_async::test]
    async fn test_bucket_root_lists_with_empty_prefix() {
        let mut objects = MockObjects::new();
        objects
            .expect_list_page()
            .withf(|_, prefix, token, _| prefix.is_empty() && token.is_none())
            .times(1)
            .returning(|_, _, _, _| {
                Ok(ListPage {
                    objects: vec![object("top.txt", 3)],
                    prefixes: vec!["docs/".to_string()],
                    next_token: None,
                })
            });

        let (nodes, next) = store(objects).list_children("", None).await.unwrap();

        assert!(next.is_none());
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "top.txt"]);
    }

    #[core_async::test]
    async fn test_create_folder_is_a_prefix_without_requests() {
        let store = store(MockObjects::new());
        assert_eq!(store.create_folder("photos/", "2024").await.unwrap(), "photos/2024/");
        assert_eq!(store.create_folder("", "a/b").await.unwrap(), "a_b/");
        assert_eq!(store.create_folder("photos", "x").await.unwrap(), "photos/x/");
    }

    #[core_async::test]
    async fn test_find_child_folder_checks_prefix() {
        let mut objects = MockObjects::new();
        objects
            .expect_list_page()
            .withf(|_, prefix, _, max_keys| prefix == "photos/2024/" && *max_keys == 1)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(ListPage {
                    objects: vec![object("photos/2024/a.jpg", 1)],
                    ..ListPage::default()
                })
            });
        objects
            .expect_list_page()
            .withf(|_, prefix, _, _| prefix == "photos/2025/")
            .times(1)
            .returning(|_, _, _, _| Ok(ListPage::default()));

        let store = store(objects);
        assert_eq!(
            store.find_child_folder("photos/", "2024").await.unwrap(),
            Some("photos/2024/".to_string())
        );
        assert_eq!(store.find_child_folder("photos/", "2025").await.unwrap(), None);
    }

    #[core_async::test]
    async fn test_upload_puts_key_under_parent() {
        let mut objects = MockObjects::new();
        objects
            .expect_put()
            .with(eq("bucket"), eq("backup/b/c.txt"), eq(Bytes::from_static(b"hello")))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let node = store(objects)
            .upload("backup/b/", "c.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(node.id, "backup/b/c.txt");
        assert_eq!(node.name, "c.txt");
        assert_eq!(node.size, Some(5));
        assert_eq!(node.parent_ids, vec!["backup/b/".to_string()]);
    }

    #[core_async::test]
    async fn test_get_metadata_for_files_and_prefixes() {
        let mut objects = MockObjects::new();
        objects
            .expect_head()
            .with(eq("bucket"), eq("docs/report.pdf"))
            .times(1)
            .returning(|_, key| {
                Ok(ObjectInfo {
                    content_type: Some("application/pdf".to_string()),
                    ..object(key, 42)
                })
            });

        let store = store(objects);
        let file = store.get_metadata("docs/report.pdf").await.unwrap();
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(file.parent_ids, vec!["docs/".to_string()]);

        let folder = store.get_metadata("docs/").await.unwrap();
        assert!(folder.is_folder());
        assert_eq!(folder.name, "docs");
        assert_eq!(folder.parent_ids, vec![String::new()]);
    }

    #[core_async::test]
    async fn test_download_errors_are_classified() {
        let mut missing = MockObjects::new();
        missing.expect_get().times(1).returning(|_, _| {
            Err(S3Error::Service {
                status: 404,
                code: "NoSuchKey".to_string(),
                message: "gone".to_string(),
            })
        });
        let mut flaky = MockObjects::new();
        flaky
            .expect_get()
            .times(1)
            .returning(|_, _| Err(S3Error::Transport("timeout".to_string())));

        let error = store(missing).download("a.txt").await.unwrap_err();
        assert_eq!(error.permanent_reason(), Some(PermanentReason::NotFound));
        let error = store(flaky).download("a.txt").await.unwrap_err();
        assert!(error.is_retryable());
    }

    #[core_async::test]
    async fn test_export_is_unsupported() {
        let format = ExportFormat::new("application/pdf", ".pdf");
        let error = store(MockObjects::new())
            .export_as("a", &format)
            .await
            .unwrap_err();
        assert_eq!(error.permanent_reason(), Some(PermanentReason::Unsupported));
    }
}
