//! # Folder Resolution
//!
//! Maps `(destination root, relative path)` to a destination folder id,
//! creating missing folders on first use.
//!
//! ## Concurrency
//!
//! Each cache key owns its own [`OnceCell`]. The map lock is held only long
//! enough to fetch or insert that cell and never across a store call, so
//! unrelated paths resolve in parallel while concurrent callers of the same
//! path wait for a single lookup-or-create. Ancestors are resolved first, each
//! under its own key.
//!
//! A failed resolution is cached too: every item below the folder fails with
//! a structural error without attempting the creation again.

use crate::error::{Result, TransferError};
use crate::item::RelativePath;
use crate::retry::RetryPolicy;
use bridge_traits::error::BridgeError;
use bridge_traits::storage::RemoteStore;
use core_async::sync::OnceCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Full path tuple identifying one destination folder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderKey {
    pub root_id: String,
    pub path: RelativePath,
}

impl FolderKey {
    pub fn new(root_id: impl Into<String>, path: RelativePath) -> Self {
        Self {
            root_id: root_id.into(),
            path,
        }
    }
}

/// Why a destination folder could not be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralFailure {
    pub path: String,
    pub reason: String,
}

impl From<&StructuralFailure> for TransferError {
    fn from(failure: &StructuralFailure) -> Self {
        TransferError::Structural {
            path: failure.path.clone(),
            reason: failure.reason.clone(),
        }
    }
}

type Resolution = std::result::Result<String, StructuralFailure>;
type Slot = Arc<OnceCell<Resolution>>;

/// Run-scoped map of resolved folders
#[derive(Debug, Default)]
pub struct FolderCache {
    slots: Mutex<HashMap<FolderKey, Slot>>,
}

impl FolderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &FolderKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.clone()).or_default().clone()
    }

    /// The settled resolution for `key`, if any
    pub fn get(&self, key: &FolderKey) -> Option<Resolution> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves destination folders through a shared [`FolderCache`]
pub struct FolderResolver {
    store: Arc<dyn RemoteStore>,
    cache: FolderCache,
    retry: RetryPolicy,
    folders_created: AtomicU64,
    lookups: AtomicU64,
}

impl FolderResolver {
    pub fn new(store: Arc<dyn RemoteStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            cache: FolderCache::new(),
            retry,
            folders_created: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &FolderCache {
        &self.cache
    }

    /// Folders this resolver created at the destination
    pub fn folders_created(&self) -> u64 {
        self.folders_created.load(Ordering::Relaxed)
    }

    /// Lookup-or-create operations actually sent to the store
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Destination folder id for `path` under `root_id`
    ///
    /// The empty path resolves to `root_id` itself.
    #[instrument(skip(self, path), fields(path = %path))]
    pub async fn resolve(&self, root_id: &str, path: &RelativePath) -> Result<String> {
        let mut parent = root_id.to_string();

        for (depth, name) in path.segments().iter().enumerate() {
            let prefix = path.prefix(depth + 1);
            let key = FolderKey::new(root_id, prefix.clone());
            let slot = self.slot_for(&key);

            let parent_id = parent.clone();
            let resolution = slot
                .get_or_init(|| self.lookup_or_create(parent_id, name.clone(), prefix))
                .await;

            match resolution {
                Ok(id) => parent = id.clone(),
                Err(failure) => return Err(failure.into()),
            }
        }

        Ok(parent)
    }

    fn slot_for(&self, key: &FolderKey) -> Slot {
        self.cache.slot(key)
    }

    /// Find the folder, creating it when absent
    ///
    /// Each retry re-checks for an existing folder first, so a create that
    /// succeeded remotely but failed locally is not duplicated.
    async fn lookup_or_create(
        &self,
        parent_id: String,
        name: String,
        path: RelativePath,
    ) -> Resolution {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let store = &self.store;
        let created = &self.folders_created;
        let parent_id = parent_id.as_str();
        let name = name.as_str();

        let (outcome, attempts) = self
            .retry
            .run("resolve_folder", None, || async move {
                if let Some(id) = store.find_child_folder(parent_id, name).await? {
                    debug!(parent = parent_id, folder = name, id = %id, "Found existing folder");
                    return Ok(id);
                }
                let id = store.create_folder(parent_id, name).await?;
                created.fetch_add(1, Ordering::Relaxed);
                info!(parent = parent_id, folder = name, id = %id, "Created folder");
                Ok::<_, BridgeError>(id)
            })
            .await;

        outcome.map_err(|error| {
            warn!(path = %path, attempts, error = %error, "Folder resolution failed");
            StructuralFailure {
                path: path.to_string(),
                reason: error.to_string(),
            }
        })
    }
}
