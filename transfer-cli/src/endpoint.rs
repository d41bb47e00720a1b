//! Source and destination addressing.
//!
//! `gdrive:<folder-id>` names a Drive folder (`gdrive:root` is the user's My
//! Drive), `s3://bucket/prefix` a key prefix in a bucket, and `local:<path>`
//! or a bare path a local directory.

use anyhow::{bail, Context, Result};
use bridge_desktop::{LocalFolderStore, ReqwestHttpClient};
use bridge_traits::storage::RemoteStore;
use provider_google_drive::GoogleDriveStore;
use provider_s3::{S3Location, S3Options, S3Store};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

const DRIVE_SCHEME: &str = "gdrive:";
const LOCAL_SCHEME: &str = "local:";
const S3_SCHEME: &str = "s3://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Drive { folder_id: String },
    S3 { location: S3Location },
    Local { path: PathBuf },
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix(DRIVE_SCHEME) {
            let id = id.trim();
            if id.is_empty() {
                return Err(format!("missing folder id in '{s}'"));
            }
            return Ok(Endpoint::Drive {
                folder_id: id.to_string(),
            });
        }

        if s.starts_with(S3_SCHEME) {
            let location = s.parse::<S3Location>().map_err(|e| e.to_string())?;
            return Ok(Endpoint::S3 { location });
        }

        let path = s.strip_prefix(LOCAL_SCHEME).unwrap_or(s);
        if path.is_empty() {
            return Err(format!("missing path in '{s}'"));
        }
        Ok(Endpoint::Local {
            path: PathBuf::from(path),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Drive { folder_id } => write!(f, "{DRIVE_SCHEME}{folder_id}"),
            Endpoint::S3 { location } => write!(f, "{location}"),
            Endpoint::Local { path } => write!(f, "{LOCAL_SCHEME}{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Destination,
}

/// Credentials and client settings shared by every endpoint
#[derive(Clone, Default)]
pub struct Connection {
    pub access_token: Option<String>,
    pub s3: S3Options,
}

/// A store plus the id of the folder the transfer starts from
pub struct OpenedEndpoint {
    pub store: Arc<dyn RemoteStore>,
    pub root_id: String,
}

impl Endpoint {
    pub fn is_drive(&self) -> bool {
        matches!(self, Endpoint::Drive { .. })
    }

    /// Builds the store for this endpoint
    ///
    /// A local source must already be a directory; a local destination is
    /// created when missing.
    pub async fn open(&self, role: Role, connection: &Connection) -> Result<OpenedEndpoint> {
        match self {
            Endpoint::Drive { folder_id } => {
                let Some(token) = connection.access_token.as_deref().filter(|t| !t.is_empty())
                else {
                    bail!("{self} needs an access token (--access-token or GDRIVE_ACCESS_TOKEN)");
                };
                let http = ReqwestHttpClient::new().context("failed to build HTTP client")?;
                Ok(OpenedEndpoint {
                    store: Arc::new(GoogleDriveStore::new(Arc::new(http), token.to_string())),
                    root_id: folder_id.clone(),
                })
            }
            Endpoint::S3 { location } => {
                let (store, root_id) = S3Store::open(&connection.s3, location).await;
                Ok(OpenedEndpoint {
                    store: Arc::new(store),
                    root_id,
                })
            }
            Endpoint::Local { path } => {
                match role {
                    Role::Source => {
                        if !path.is_dir() {
                            bail!("source directory {} does not exist", path.display());
                        }
                    }
                    Role::Destination => std::fs::create_dir_all(path).with_context(|| {
                        format!("failed to create destination {}", path.display())
                    })?,
                }
                Ok(OpenedEndpoint {
                    store: Arc::new(LocalFolderStore::new(path.clone())),
                    root_id: LocalFolderStore::ROOT_ID.to_string(),
                })
            }
        }
    }
}
