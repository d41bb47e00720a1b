//! Google Drive API connector implementation
//!
//! Implements the `RemoteStore` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{ExportFormat, NodeKind, RemoteNode, RemoteStore};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{
    DriveFile, FilesListResponse, NewFileMetadata, FOLDER_MIME_TYPE, GOOGLE_APPS_PREFIX,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload endpoint base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const FILE_FIELDS: &str =
    "id,name,mimeType,size,createdTime,modifiedTime,parents,owners(displayName,emailAddress),trashed";

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const CONTENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Google Drive store
///
/// Every method performs a single API round trip; retrying is the caller's job.
/// Status codes are classified through [`GoogleDriveError::from_response`] so
/// rate limits and 5xx surface as transient failures.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveStore;
/// use bridge_traits::storage::RemoteStore;
///
/// let store = GoogleDriveStore::new(http_client, access_token);
/// let (children, next_page) = store.list_children("root", None).await?;
/// ```
pub struct GoogleDriveStore {
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token with a `drive` scope
    access_token: String,

    api_base: String,
    upload_base: String,
}

impl GoogleDriveStore {
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Point the store at alternative endpoints (e.g. a local emulator)
    pub fn with_endpoints(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    fn request(&self, method: HttpMethod, url: String, timeout: Duration) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(self.access_token.as_str())
            .timeout(timeout)
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    /// Quote a value for use inside a Drive search query literal
    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }

    fn node_kind(mime_type: &str) -> NodeKind {
        if mime_type == FOLDER_MIME_TYPE {
            NodeKind::Folder
        } else if mime_type.starts_with(GOOGLE_APPS_PREFIX) {
            NodeKind::ExportableDocument
        } else {
            NodeKind::File
        }
    }

    fn convert_file(drive_file: DriveFile) -> RemoteNode {
        let owner = drive_file
            .owners
            .first()
            .and_then(|o| o.email_address.clone().or_else(|| o.display_name.clone()));

        RemoteNode {
            kind: Self::node_kind(&drive_file.mime_type),
            size: drive_file.size.and_then(|s| s.parse().ok()),
            created_at: drive_file
                .created_time
                .as_deref()
                .and_then(Self::parse_timestamp),
            modified_at: drive_file
                .modified_time
                .as_deref()
                .and_then(Self::parse_timestamp),
            mime_type: (!drive_file.mime_type.is_empty()).then_some(drive_file.mime_type),
            id: drive_file.id,
            name: drive_file.name,
            parent_ids: drive_file.parents,
            owner,
        }
    }

    /// Execute one request and map non-2xx statuses to classified errors
    async fn send(&self, request: HttpRequest, subject: &str) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            Ok(response)
        } else {
            warn!(status = response.status, subject, "Drive API request failed");
            Err(GoogleDriveError::from_response(response.status, &response.body, subject).into())
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    /// Build a `multipart/related` body holding JSON metadata followed by content
    fn multipart_body(boundary: &str, metadata: &[u8], data: &[u8]) -> Bytes {
        let mut body = BytesMut::with_capacity(metadata.len() + data.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata);
        body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        body.freeze()
    }
}

#[async_trait]
impl RemoteStore for GoogleDriveStore {
    fn name(&self) -> &str {
        "gdrive"
    }

    #[instrument(skip(self), fields(folder_id = %folder_id))]
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteNode>, Option<String>)> {
        let query = format!("{} in parents and trashed=false", Self::quote(folder_id));
        let mut request = self
            .request(HttpMethod::Get, format!("{}/files", self.api_base), METADATA_TIMEOUT)
            .query("q", &query)
            .query("pageSize", &MAX_PAGE_SIZE.to_string())
            .query("fields", &format!("nextPageToken,files({})", FILE_FIELDS))
            .query("supportsAllDrives", "true")
            .query("includeItemsFromAllDrives", "true");
        if let Some(token) = page_token.as_deref() {
            request = request.query("pageToken", token);
        }

        let response = self.send(request, folder_id).await?;
        let list: FilesListResponse = Self::parse(&response, "files list response")?;

        let nodes: Vec<RemoteNode> = list
            .files
            .into_iter()
            .filter(|f| !f.trashed)
            .map(Self::convert_file)
            .collect();

        debug!(count = nodes.len(), has_more = list.next_page_token.is_some(), "Listed Drive folder");
        Ok((nodes, list.next_page_token))
    }

    #[instrument(skip(self), fields(node_id = %node_id))]
    async fn get_metadata(&self, node_id: &str) -> Result<RemoteNode> {
        let request = self
            .request(
                HttpMethod::Get,
                format!("{}/files/{}", self.api_base, node_id),
                METADATA_TIMEOUT,
            )
            .query("fields", FILE_FIELDS)
            .query("supportsAllDrives", "true");

        let response = self.send(request, node_id).await?;
        let file: DriveFile = Self::parse(&response, "file metadata")?;
        Ok(Self::convert_file(file))
    }

    #[instrument(skip(self), fields(parent_id = %parent_id, name = %name))]
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        let metadata = NewFileMetadata {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: vec![parent_id],
        };
        let request = self
            .request(
                HttpMethod::Post,
                format!("{}/files", self.api_base),
                METADATA_TIMEOUT,
            )
            .query("fields", "id")
            .query("supportsAllDrives", "true")
            .json(&metadata)?;

        let response = self.send(request, parent_id).await?;
        let created: DriveFile = Self::parse(&response, "created folder")?;
        info!(folder_id = %created.id, "Created Drive folder");
        Ok(created.id)
    }

    #[instrument(skip(self), fields(parent_id = %parent_id, name = %name))]
    async fn find_child_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>> {
        let query = format!(
            "{} in parents and name={} and mimeType={} and trashed=false",
            Self::quote(parent_id),
            Self::quote(name),
            Self::quote(FOLDER_MIME_TYPE)
        );
        let request = self
            .request(HttpMethod::Get, format!("{}/files", self.api_base), METADATA_TIMEOUT)
            .query("q", &query)
            .query("pageSize", "1")
            .query("fields", "files(id)")
            .query("supportsAllDrives", "true")
            .query("includeItemsFromAllDrives", "true");

        let response = self.send(request, parent_id).await?;
        let list: FilesListResponse = Self::parse(&response, "folder lookup")?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    #[instrument(skip(self), fields(node_id = %node_id))]
    async fn download(&self, node_id: &str) -> Result<Bytes> {
        let request = self
            .request(
                HttpMethod::Get,
                format!("{}/files/{}", self.api_base, node_id),
                CONTENT_TIMEOUT,
            )
            .query("alt", "media")
            .query("supportsAllDrives", "true");

        let response = self.send(request, node_id).await?;
        debug!(bytes = response.body.len(), "Downloaded file");
        Ok(response.body)
    }

    #[instrument(skip(self), fields(node_id = %node_id, mime_type = %format.mime_type))]
    async fn export_as(&self, node_id: &str, format: &ExportFormat) -> Result<Bytes> {
        let request = self
            .request(
                HttpMethod::Get,
                format!("{}/files/{}/export", self.api_base, node_id),
                CONTENT_TIMEOUT,
            )
            .query("mimeType", &format.mime_type);

        let response = self.send(request, node_id).await?;
        debug!(bytes = response.body.len(), "Exported document");
        Ok(response.body)
    }

    #[instrument(skip(self, data), fields(parent_id = %parent_id, name = %name, bytes = data.len()))]
    async fn upload(&self, parent_id: &str, name: &str, data: Bytes) -> Result<RemoteNode> {
        let metadata = NewFileMetadata {
            name,
            mime_type: None,
            parents: vec![parent_id],
        };
        let metadata = serde_json::to_vec(&metadata)
            .map_err(|e| GoogleDriveError::ParseError(format!("upload metadata: {}", e)))?;
        let boundary = format!("transfer-{}", uuid::Uuid::new_v4().simple());

        let request = self
            .request(
                HttpMethod::Post,
                format!("{}/files", self.upload_base),
                CONTENT_TIMEOUT,
            )
            .query("uploadType", "multipart")
            .query("fields", FILE_FIELDS)
            .query("supportsAllDrives", "true")
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(Self::multipart_body(&boundary, &metadata, &data));

        let response = self.send(request, parent_id).await?;
        let file: DriveFile = Self::parse(&response, "uploaded file")?;
        Ok(Self::convert_file(file))
    }
}
