//! Optional content conversion between fetch and upload.

use crate::error::Result;
use crate::item::TransferItem;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Output of a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub data: Bytes,
    /// Replacement destination name, e.g. `photo.heic` → `photo.jpg`
    pub name: Option<String>,
}

impl Converted {
    pub fn unchanged_name(data: Bytes) -> Self {
        Self { data, name: None }
    }

    pub fn renamed(data: Bytes, name: impl Into<String>) -> Self {
        Self {
            data,
            name: Some(name.into()),
        }
    }
}

/// Rewrites the payload of selected items before upload
///
/// Implementations should fail with
/// [`TransferError::Conversion`](crate::error::TransferError::Conversion);
/// conversion failures are never retried.
#[async_trait]
pub trait ContentConverter: Send + Sync {
    fn name(&self) -> &str;

    fn applies_to(&self, item: &TransferItem) -> bool;

    async fn convert(&self, item: &TransferItem, data: Bytes) -> Result<Converted>;
}

/// Picks the first converter that applies to `item`
pub fn select_converter<'a>(
    converters: &'a [Arc<dyn ContentConverter>],
    item: &TransferItem,
) -> Option<&'a Arc<dyn ContentConverter>> {
    converters.iter().find(|c| c.applies_to(item))
}
