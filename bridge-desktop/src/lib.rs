//! # Desktop Bridge Implementations
//!
//! Default adapters for desktop hosts (macOS, Windows, Linux):
//! - [`ReqwestHttpClient`] implements `HttpClient` using `reqwest`
//! - [`LocalFolderStore`] implements `RemoteStore` over a local directory with `tokio::fs`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LocalFolderStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! let destination = Arc::new(LocalFolderStore::new("/srv/backup"));
//! ```

mod filesystem;
mod http;

pub use filesystem::LocalFolderStore;
pub use http::ReqwestHttpClient;
