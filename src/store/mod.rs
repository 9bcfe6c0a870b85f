//! Image store abstraction
//!
//! The cache only reads images, follows parent links and asks the store to
//! create restored images. Layer storage, platform blobs and on-disk
//! layout stay behind this trait.

pub mod memory;
pub mod snapshot;

pub use memory::{MemoryStore, StoreStats};
pub use snapshot::{load_snapshot, Snapshot, SnapshotEntry};

use crate::error::StoreResult;
use crate::image::{DiffId, Image, ImageId};
use async_trait::async_trait;

/// Store operations the build cache relies on
///
/// Implementations provide their own synchronization; the cache may be
/// used from several builds at once, each holding its own cache instance.
#[async_trait]
pub trait ImageCacheStore: Send + Sync {
    /// Fetch an image by identity
    async fn get(&self, id: &ImageId) -> StoreResult<Image>;

    /// Resolve a reference (name, tag or id) to an image
    async fn get_by_ref(&self, reference: &str) -> StoreResult<Image>;

    /// Record `parent` as the parent of `child`
    async fn set_parent(&self, child: &ImageId, parent: &ImageId) -> StoreResult<()>;

    /// Parent of `id`, if one is linked
    async fn get_parent(&self, id: &ImageId) -> StoreResult<Option<ImageId>>;

    /// Persist a new image on top of `parent`.
    ///
    /// `extra_layer` is the single layer the image adds over its parent,
    /// `None` when the step produced no filesystem change.
    async fn create(
        &self,
        parent: Option<&Image>,
        image: Image,
        extra_layer: Option<&DiffId>,
    ) -> StoreResult<ImageId>;

    /// Whether the image was produced by a local build (as opposed to pulled or imported)
    async fn is_built_locally(&self, id: &ImageId) -> StoreResult<bool>;

    /// Direct children of `id`
    async fn children(&self, id: &ImageId) -> Vec<ImageId>;
}
