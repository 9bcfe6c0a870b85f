//! JSON store snapshots
//!
//! A snapshot describes a set of images, their parent links and the
//! references pointing at them, so a [`MemoryStore`] can be seeded for
//! offline cache probes. Image ids are content-derived, so entries refer
//! to each other by a local `name`.
//!
//! ```json
//! {
//!   "images": [
//!     { "name": "base", "image": { "os": "linux", ... } },
//!     { "name": "app", "parent": "base", "built_locally": true,
//!       "references": ["app:latest"], "image": { ... } }
//!   ]
//! }
//! ```

use super::MemoryStore;
use crate::error::{CacheError, CacheResult};
use crate::image::{Image, ImageId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Snapshot file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub images: Vec<SnapshotEntry>,
}

/// One image in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Local alias, also registered as a reference
    pub name: String,

    /// Alias of the parent entry
    #[serde(default)]
    pub parent: Option<String>,

    #[serde(default)]
    pub built_locally: bool,

    #[serde(default)]
    pub references: Vec<String>,

    pub image: Image,
}

impl Snapshot {
    /// Populate `store` with the snapshot's images, returning alias -> id.
    ///
    /// Parents must appear before their children.
    pub async fn apply(self, store: &MemoryStore) -> CacheResult<HashMap<String, ImageId>> {
        let mut ids: HashMap<String, ImageId> = HashMap::new();

        for entry in self.images {
            let parent = match &entry.parent {
                Some(alias) => Some(ids.get(alias).cloned().ok_or_else(|| {
                    CacheError::InvalidArgument(format!(
                        "snapshot entry '{}' names unknown parent '{}'",
                        entry.name, alias
                    ))
                })?),
                None => None,
            };

            let entry_err = |e: crate::error::StoreError| {
                CacheError::InvalidArgument(format!("snapshot entry '{}': {}", entry.name, e))
            };

            let id = if entry.built_locally {
                store.insert_local(entry.image, parent.as_ref()).await
            } else {
                store.insert(entry.image).await
            }
            .map_err(entry_err)?;

            if let (false, Some(parent)) = (entry.built_locally, &parent) {
                store.link(&id, parent).await.map_err(entry_err)?;
            }

            for reference in std::iter::once(&entry.name).chain(entry.references.iter()) {
                store.tag(reference.clone(), &id).await.map_err(|e| {
                    CacheError::InvalidArgument(format!("tagging {}: {}", reference, e))
                })?;
            }

            debug!("Loaded snapshot image {} as {}", entry.name, id.short());
            ids.insert(entry.name, id);
        }

        Ok(ids)
    }
}

/// Read a snapshot file and load it into a fresh store
pub async fn load_snapshot(path: &Path) -> CacheResult<(MemoryStore, HashMap<String, ImageId>)> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| CacheError::io(format!("reading snapshot {}", path.display()), e))?;

    let snapshot: Snapshot =
        serde_json::from_str(&content).map_err(|e| CacheError::Snapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let store = MemoryStore::new();
    let ids = snapshot.apply(&store).await?;
    Ok((store, ids))
}
