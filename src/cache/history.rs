//! History-based cache
//!
//! Matches build steps against the recorded history of a set of source
//! images (typically pulled `--cache-from` references) instead of only
//! direct children in the store.
//!
//! # Source set states
//!
//! | State | Sources | Entered |
//! |-------|---------|---------|
//! | Seeded | every registered image, in order | construction |
//! | Narrowed | the single image a restoration came from | first mid-history match |
//!
//! Narrowing anchors the rest of the build to one lineage so a later step
//! cannot jump onto an unrelated branch of history.

use super::lineage::is_ancestor_or_self;
use super::local::{platform_compatible, LocalImageCache};
use super::restore::restore_cached_image;
use super::ImageCache;
use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult};
use crate::image::{ContainerConfig, History, Image, ImageId, Platform};
use crate::store::ImageCacheStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Candidate images a build may reuse history from
#[derive(Debug, Clone)]
pub enum SourceSet {
    Seeded(Vec<Image>),
    Narrowed(Image),
}

impl SourceSet {
    pub fn as_slice(&self) -> &[Image] {
        match self {
            Self::Seeded(images) => images,
            Self::Narrowed(image) => std::slice::from_ref(image),
        }
    }
}

/// Cache based on history objects; requires an initial set of images
pub struct HistoryImageCache {
    sources: SourceSet,
    store: Arc<dyn ImageCacheStore>,
    local: LocalImageCache,
    settings: CacheSettings,
}

impl HistoryImageCache {
    pub fn new(store: Arc<dyn ImageCacheStore>, settings: &CacheSettings) -> Self {
        Self {
            sources: SourceSet::Seeded(Vec::new()),
            local: LocalImageCache::new(store.clone(), settings),
            store,
            settings: settings.clone(),
        }
    }

    /// Register a source image. Ignored once the set has been narrowed.
    pub fn populate(&mut self, image: Image) {
        match &mut self.sources {
            SourceSet::Seeded(images) => {
                debug!("Registered cache source {}", image.id.short());
                images.push(image);
            }
            SourceSet::Narrowed(anchor) => {
                warn!(
                    "Ignoring cache source {}: build is anchored to {}",
                    image.id.short(),
                    anchor.id.short()
                );
            }
        }
    }

    pub fn sources(&self) -> &[Image] {
        self.sources.as_slice()
    }

    pub fn is_narrowed(&self) -> bool {
        matches!(self.sources, SourceSet::Narrowed(_))
    }

    /// Resolve a cached image for the step `config` on top of `parent_id`
    pub async fn find(
        &mut self,
        parent_id: &str,
        config: &ContainerConfig,
        platform: &Platform,
    ) -> CacheResult<Option<ImageId>> {
        if let Some(hit) = self.local.find(parent_id, config, platform).await? {
            for source in self.sources.as_slice() {
                if is_ancestor_or_self(
                    self.store.as_ref(),
                    &source.id,
                    &hit,
                    self.settings.reject_parent_cycles,
                )
                .await?
                {
                    debug!("Local hit {} belongs to source {}", hit.short(), source.id.short());
                    return Ok(Some(hit));
                }
            }
        }

        let parent = if parent_id.is_empty() {
            None
        } else {
            let id = ImageId::new(parent_id);
            let image = self
                .store
                .get(&id)
                .await
                .map_err(|source| CacheError::ParentLookup {
                    id: id.to_string(),
                    source,
                })?;
            Some(image)
        };
        let len_history = parent.as_ref().map_or(0, |p| p.history.len());

        let legacy = self.settings.legacy_platform_wildcard;
        let Some(target) = self
            .sources
            .as_slice()
            .iter()
            .find(|target| {
                is_valid_parent(target, parent.as_ref())
                    && target
                        .history
                        .get(len_history)
                        .is_some_and(|entry| is_valid_config(config, entry))
                    && platform_compatible(platform, &target.platform(), legacy)
            })
            .cloned()
        else {
            debug!("No cache source matches step {:?}", config.joined_cmd());
            return Ok(None);
        };

        if len_history + 1 == target.history.len() {
            if let Some(parent) = &parent {
                if let Err(e) = self.store.set_parent(&target.id, &parent.id).await {
                    debug!(
                        "Failed to set parent for {} to {}: {}",
                        target.id.short(),
                        parent.id.short(),
                        e
                    );
                }
            }
            debug!("Cache source {} matches at its final step", target.id.short());
            return Ok(Some(target.id));
        }

        let id = restore_cached_image(
            self.store.as_ref(),
            parent.as_ref(),
            &target,
            config,
            &self.settings.builder_version,
        )
        .await
        .map_err(|e| CacheError::Restore {
            parent: parent_id.to_string(),
            target: target.id.to_string(),
            source: Box::new(e),
        })?;

        self.sources = SourceSet::Narrowed(target);
        Ok(Some(id))
    }
}

#[async_trait]
impl ImageCache for HistoryImageCache {
    async fn get_cache(
        &mut self,
        parent_id: &str,
        config: &ContainerConfig,
        platform: &Platform,
    ) -> CacheResult<Option<ImageId>> {
        self.find(parent_id, config, platform).await
    }

    fn kind(&self) -> &'static str {
        "history"
    }
}

/// A step's command matches a history entry when the space-joined tokens
/// equal the recorded `created_by`
pub(crate) fn is_valid_config(config: &ContainerConfig, entry: &History) -> bool {
    config.joined_cmd() == entry.created_by
}

/// Whether `image` extends `parent`: parent history and layers are strict
/// leading prefixes of the image's. A missing parent, or one with neither
/// history nor layers, is extended by any image with history.
pub(crate) fn is_valid_parent(image: &Image, parent: Option<&Image>) -> bool {
    if image.history.is_empty() {
        return false;
    }
    let Some(parent) = parent else {
        return true;
    };
    if parent.history.is_empty() && parent.rootfs.diff_ids.is_empty() {
        return true;
    }
    if parent.history.len() >= image.history.len() {
        return false;
    }

    parent
        .history
        .iter()
        .zip(&image.history)
        .all(|(p, h)| p.same_step(h))
        && parent.rootfs.is_prefix_of(&image.rootfs)
}
