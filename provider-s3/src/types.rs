//! Addressing and listing types for the S3 store

use std::fmt;
use std::str::FromStr;

use crate::error::S3Error;

pub const S3_SCHEME: &str = "s3://";

/// `s3://bucket/prefix`, with the prefix normalised to end in `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Folder id of the location; empty for the bucket root
    pub prefix: String,
}

impl S3Location {
    pub fn new(bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: normalize_prefix(prefix),
        }
    }
}

/// Strips leading slashes and adds the trailing one
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

impl FromStr for S3Location {
    type Err = S3Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(S3_SCHEME)
            .ok_or_else(|| S3Error::InvalidLocation(format!("expected {S3_SCHEME}bucket/prefix, got '{s}'")))?;
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(S3Error::InvalidLocation(format!("missing bucket in '{s}'")));
        }
        Ok(Self::new(bucket, prefix))
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{S3_SCHEME}{}/{}", self.bucket, self.prefix)
    }
}

/// Object summary from a listing or `HeadObject`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectInfo {
    pub key: String,
    pub size: Option<u64>,
    /// Unix seconds
    pub last_modified: Option<i64>,
    pub content_type: Option<String>,
    pub owner: Option<String>,
}

/// One `ListObjectsV2` page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    /// Common prefixes, each ending in `/`
    pub prefixes: Vec<String>,
    pub next_token: Option<String>,
}
