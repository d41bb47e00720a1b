//! # S3 Provider
//!
//! Implements the `RemoteStore` trait over a single S3 bucket.
//!
//! S3 has no folders, so key prefixes ending in `/` stand in for them:
//! - Listing uses `ListObjectsV2` with a `/` delimiter; common prefixes are
//!   folders, objects are files, and the continuation token is the page token
//! - Creating a folder writes nothing and returns the new prefix
//! - Uploads are single `PutObject` calls under the parent prefix
//!
//! The SDK client sits behind [`ObjectClient`] so listing and key handling
//! can be tested without a bucket.

pub mod client;
pub mod connector;
pub mod error;
pub mod types;

pub use client::{ObjectClient, S3Options};
pub use connector::S3Store;
pub use error::{Result, S3Error};
pub use types::{ListPage, ObjectInfo, S3Location};
