//! In-memory image store
//!
//! Reference implementation of [`ImageCacheStore`] backed by maps behind a
//! `tokio::sync::RwLock`. Every trait call is counted so callers can assert
//! which store operations a cache lookup performed.

use super::ImageCacheStore;
use crate::error::{StoreError, StoreResult};
use crate::image::{DiffId, Image, ImageId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Per-operation call counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub get: usize,
    pub get_by_ref: usize,
    pub set_parent: usize,
    pub get_parent: usize,
    pub create: usize,
    pub is_built_locally: usize,
    pub children: usize,
}

#[derive(Default)]
struct Counters {
    get: AtomicUsize,
    get_by_ref: AtomicUsize,
    set_parent: AtomicUsize,
    get_parent: AtomicUsize,
    create: AtomicUsize,
    is_built_locally: AtomicUsize,
    children: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Default)]
struct Inner {
    images: HashMap<ImageId, Image>,
    parents: HashMap<ImageId, ImageId>,
    references: HashMap<String, ImageId>,
    built_locally: HashSet<ImageId>,
    /// Injected failures, keyed by reference or image id
    reference_failures: HashMap<String, StoreError>,
    built_locally_failures: HashSet<ImageId>,
    set_parent_failure: Option<StoreError>,
}

/// Image store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    counters: Counters,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image that was pulled or imported rather than built
    pub async fn insert(&self, image: Image) -> StoreResult<ImageId> {
        self.insert_image(image, false).await
    }

    /// Add an image produced by a local build, optionally linked to a parent
    pub async fn insert_local(
        &self,
        image: Image,
        parent: Option<&ImageId>,
    ) -> StoreResult<ImageId> {
        let id = self.insert_image(image, true).await?;
        if let Some(parent) = parent {
            self.link(&id, parent).await?;
        }
        Ok(id)
    }

    /// Point a reference at an image
    pub async fn tag(&self, reference: impl Into<String>, id: &ImageId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.images.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        inner.references.insert(reference.into(), id.clone());
        Ok(())
    }

    /// Set a parent link without counting it as a cache-issued write
    pub async fn link(&self, child: &ImageId, parent: &ImageId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        Self::link_locked(&mut inner, child, parent)
    }

    /// Make `get_by_ref(reference)` fail with `err`
    pub async fn fail_reference(&self, reference: impl Into<String>, err: StoreError) {
        self.inner
            .write()
            .await
            .reference_failures
            .insert(reference.into(), err);
    }

    /// Make `is_built_locally(id)` fail
    pub async fn fail_built_locally(&self, id: &ImageId) {
        self.inner
            .write()
            .await
            .built_locally_failures
            .insert(id.clone());
    }

    /// Make every `set_parent` call fail with `err`
    pub async fn fail_set_parent(&self, err: StoreError) {
        self.inner.write().await.set_parent_failure = Some(err);
    }

    /// Number of stored images
    pub async fn len(&self) -> usize {
        self.inner.read().await.images.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> StoreStats {
        let c = &self.counters;
        StoreStats {
            get: c.get.load(Ordering::Relaxed),
            get_by_ref: c.get_by_ref.load(Ordering::Relaxed),
            set_parent: c.set_parent.load(Ordering::Relaxed),
            get_parent: c.get_parent.load(Ordering::Relaxed),
            create: c.create.load(Ordering::Relaxed),
            is_built_locally: c.is_built_locally.load(Ordering::Relaxed),
            children: c.children.load(Ordering::Relaxed),
        }
    }

    async fn insert_image(&self, image: Image, built_locally: bool) -> StoreResult<ImageId> {
        let image = image
            .identified()
            .map_err(|e| StoreError::InvalidImage(e.to_string()))?;
        let id = image.id.clone();

        let mut inner = self.inner.write().await;
        if built_locally {
            inner.built_locally.insert(id.clone());
        }
        inner.images.insert(id.clone(), image);
        debug!("Stored image {}", id.short());
        Ok(id)
    }

    fn link_locked(inner: &mut Inner, child: &ImageId, parent: &ImageId) -> StoreResult<()> {
        if !inner.images.contains_key(child) {
            return Err(StoreError::NotFound(child.to_string()));
        }
        if !inner.images.contains_key(parent) {
            return Err(StoreError::NotFound(parent.to_string()));
        }
        inner.parents.insert(child.clone(), parent.clone());
        Ok(())
    }
}

#[async_trait]
impl ImageCacheStore for MemoryStore {
    async fn get(&self, id: &ImageId) -> StoreResult<Image> {
        bump(&self.counters.get);
        self.inner
            .read()
            .await
            .images
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_by_ref(&self, reference: &str) -> StoreResult<Image> {
        bump(&self.counters.get_by_ref);
        let inner = self.inner.read().await;
        if let Some(err) = inner.reference_failures.get(reference) {
            return Err(err.clone());
        }

        let id = inner
            .references
            .get(reference)
            .cloned()
            .unwrap_or_else(|| ImageId::new(reference));
        inner
            .images
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::ReferenceNotFound(reference.to_string()))
    }

    async fn set_parent(&self, child: &ImageId, parent: &ImageId) -> StoreResult<()> {
        bump(&self.counters.set_parent);
        let mut inner = self.inner.write().await;
        if let Some(err) = &inner.set_parent_failure {
            return Err(err.clone());
        }
        Self::link_locked(&mut inner, child, parent)
    }

    async fn get_parent(&self, id: &ImageId) -> StoreResult<Option<ImageId>> {
        bump(&self.counters.get_parent);
        let inner = self.inner.read().await;
        if !inner.images.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(inner.parents.get(id).cloned())
    }

    async fn create(
        &self,
        parent: Option<&Image>,
        image: Image,
        extra_layer: Option<&DiffId>,
    ) -> StoreResult<ImageId> {
        bump(&self.counters.create);

        let parent_layers = parent.map(|p| p.rootfs.diff_ids.as_slice()).unwrap_or(&[]);
        let mut expected = parent_layers.to_vec();
        if let Some(layer) = extra_layer {
            expected.push(layer.clone());
        }
        if image.rootfs.diff_ids != expected {
            return Err(StoreError::InvalidImage(format!(
                "rootfs has {} layers, expected {} from parent plus extra layer",
                image.rootfs.diff_ids.len(),
                expected.len()
            )));
        }

        let image = image
            .identified()
            .map_err(|e| StoreError::InvalidImage(e.to_string()))?;
        let id = image.id.clone();

        let mut inner = self.inner.write().await;
        if let Some(parent) = parent {
            if !inner.images.contains_key(&parent.id) {
                return Err(StoreError::NotFound(parent.id.to_string()));
            }
        }
        inner.images.insert(id.clone(), image);
        inner.built_locally.insert(id.clone());
        if let Some(parent) = parent {
            inner.parents.insert(id.clone(), parent.id.clone());
        }

        debug!("Created image {}", id.short());
        Ok(id)
    }

    async fn is_built_locally(&self, id: &ImageId) -> StoreResult<bool> {
        bump(&self.counters.is_built_locally);
        let inner = self.inner.read().await;
        if inner.built_locally_failures.contains(id) {
            return Err(StoreError::Backend(format!(
                "cannot read build metadata for {}",
                id
            )));
        }
        Ok(inner.built_locally.contains(id))
    }

    async fn children(&self, id: &ImageId) -> Vec<ImageId> {
        bump(&self.counters.children);
        let inner = self.inner.read().await;
        let mut children: Vec<ImageId> = inner
            .parents
            .iter()
            .filter(|(_, parent)| *parent == id)
            .map(|(child, _)| child.clone())
            .collect();
        children.sort();
        children
    }
}
