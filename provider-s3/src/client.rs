//! Object-level operations the store needs, backed by the AWS SDK

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{Result, S3Error};
use crate::types::{ListPage, ObjectInfo};

/// The four S3 calls behind [`S3Store`](crate::S3Store)
///
/// Every method is a single round trip; retrying is the caller's job.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// One `ListObjectsV2` page under `prefix` with a `/` delimiter
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> Result<ListPage>;

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;
}

/// Connection settings for [`S3Options::connect`]
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// Falls back to the SDK's region chain (`AWS_REGION`, profile) when unset
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, Wasabi)
    pub endpoint_url: Option<String>,
    /// Path-style addressing, required by some S3-compatible services
    pub force_path_style: bool,
    /// Static credentials; the default credential chain is used otherwise
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3Options {
    /// Loads shared AWS configuration and builds an SDK client
    pub async fn connect(&self) -> aws_sdk_s3::Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(key_id), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            let credentials =
                aws_credential_types::Credentials::new(key_id, secret, None, None, "tree-transfer-static");
            loader = loader.credentials_provider(credentials);
        }
        let shared = loader.load().await;

        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if self.force_path_style {
            config = config.force_path_style(true);
        }
        info!(
            region = ?shared.region().map(|r| r.as_ref().to_string()),
            endpoint = ?self.endpoint_url,
            path_style = self.force_path_style,
            "S3 client configured"
        );
        aws_sdk_s3::Client::from_conf(config.build())
    }
}

fn unix_seconds(time: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<i64> {
    time.map(|t| t.secs())
}

#[async_trait]
impl ObjectClient for aws_sdk_s3::Client {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> Result<ListPage> {
        let output = self
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .delimiter("/")
            .max_keys(max_keys)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(S3Error::from_sdk)?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectInfo {
                    key: object.key()?.to_string(),
                    size: object.size().and_then(|s| u64::try_from(s).ok()),
                    last_modified: unix_seconds(object.last_modified()),
                    content_type: None,
                    owner: object
                        .owner()
                        .and_then(|o| o.display_name().or(o.id()))
                        .map(str::to_string),
                })
            })
            .collect();
        let prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            prefixes,
            next_token,
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let output = self
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(S3Error::from_sdk)?;

        Ok(ObjectInfo {
            key: key.to_string(),
            size: output.content_length().and_then(|s| u64::try_from(s).ok()),
            last_modified: unix_seconds(output.last_modified()),
            content_type: output.content_type().map(str::to_string),
            owner: None,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let output = self
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(S3Error::from_sdk)?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| S3Error::Body(e.to_string()))?;
        let data = body.into_bytes();
        debug!(key, bytes = data.len(), "Object downloaded");
        Ok(data)
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        self.put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(S3Error::from_sdk)?;
        Ok(())
    }
}
