//! Build cache resolution
//!
//! Decides, for each build step, whether an existing image can be reused
//! instead of executing the step. A false positive would put the wrong
//! filesystem into the new image, so every strategy here only answers with
//! an image whose history provably extends the parent.
//!
//! # Strategies
//!
//! | Cache | Candidates | Used when |
//! |-------|------------|-----------|
//! | [`LocalImageCache`] | locally built direct children of the parent | no cache sources given |
//! | [`HistoryImageCache`] | local children first, then source image histories | `cache_from` references given |

pub mod history;
pub mod lineage;
pub mod local;
pub mod restore;

#[cfg(test)]
pub(crate) mod testutil;

pub use history::{HistoryImageCache, SourceSet};
pub use lineage::{is_ancestor_or_self, parent_chain};
pub use local::LocalImageCache;
pub use restore::{layer_for_history_index, restore_cached_image};

use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult, StoreError};
use crate::image::{ContainerConfig, ImageId, Platform};
use crate::store::ImageCacheStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache queried by the build executor once per step
///
/// Instances are build-scoped: a history cache narrows its sources as the
/// build progresses, so one instance must not serve concurrent steps.
#[async_trait]
pub trait ImageCache: Send {
    /// Image that can stand in for running `config` on top of `parent_id`.
    ///
    /// `Ok(None)` is a cache miss; errors mean the cache could not be
    /// evaluated and the step should fail.
    async fn get_cache(
        &mut self,
        parent_id: &str,
        config: &ContainerConfig,
        platform: &Platform,
    ) -> CacheResult<Option<ImageId>>;

    /// Short name of the strategy, for display
    fn kind(&self) -> &'static str;
}

/// Build the cache for one build.
///
/// Without `cache_from` references only the local parent-chain cache is
/// used. Otherwise each reference is resolved in order and registered as a
/// history source; references that cannot be resolved are skipped, but a
/// cancelled or timed-out lookup aborts construction.
pub async fn new(
    store: Arc<dyn ImageCacheStore>,
    cache_from: &[String],
    settings: &CacheSettings,
) -> CacheResult<Box<dyn ImageCache>> {
    if cache_from.is_empty() {
        debug!("No cache sources, using local parent-chain cache");
        return Ok(Box::new(LocalImageCache::new(store, settings)));
    }

    let mut cache = HistoryImageCache::new(store.clone(), settings);
    for reference in cache_from {
        let lookup = store.get_by_ref(reference);
        let result = match settings.seed_timeout() {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .unwrap_or(Err(StoreError::DeadlineExceeded)),
            None => lookup.await,
        };

        match result {
            Ok(image) => cache.populate(image),
            Err(e) if e.is_cancellation() => {
                return Err(CacheError::Seed {
                    reference: reference.clone(),
                    source: e,
                });
            }
            Err(e) => {
                warn!(
                    "Could not look up {} for cache resolution, skipping: {}",
                    reference, e
                );
            }
        }
    }

    debug!("Seeded history cache with {} source(s)", cache.sources().len());
    Ok(Box::new(cache))
}
