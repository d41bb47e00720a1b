//! # Google Drive Provider
//!
//! Implements the `RemoteStore` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This crate provides:
//! - Paginated folder listing (`'<id>' in parents and trashed=false`)
//! - Folder lookup by name and folder creation
//! - Raw downloads (`alt=media`) and exports of Drive-native documents
//! - Multipart uploads
//! - Classification of API errors into transient and permanent failures
//!
//! Authentication is out of scope: callers pass an OAuth 2.0 access token.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveStore;
pub use error::{GoogleDriveError, Result};
pub use types::{FOLDER_MIME_TYPE, GOOGLE_APPS_PREFIX};
