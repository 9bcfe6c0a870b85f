//! CLI command implementations

pub mod config;
pub mod lineage;
pub mod probe;

pub use config::execute as config;
pub use lineage::execute as lineage;
pub use probe::execute as probe;

use crate::error::{CacheError, CacheResult};
use crate::image::ImageId;
use crate::store::{ImageCacheStore, MemoryStore};

/// Resolve a snapshot name, reference or id to an image id
pub(crate) async fn resolve_image(store: &MemoryStore, name: &str) -> CacheResult<ImageId> {
    store
        .get_by_ref(name)
        .await
        .map(|image| image.id)
        .map_err(|e| CacheError::InvalidArgument(format!("unknown image '{}': {}", name, e)))
}
