//! Local parent-chain cache
//!
//! Answers "does a direct child of this parent, built on this machine,
//! already hold the result of this step?" Only locally built images carry
//! a reproducible container config, so pulled and imported children are
//! ignored.

use super::ImageCache;
use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult};
use crate::image::{compare_configs, ContainerConfig, Image, ImageId, Platform};
use crate::store::ImageCacheStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache based on the store's parent chain
pub struct LocalImageCache {
    store: Arc<dyn ImageCacheStore>,
    legacy_platform_wildcard: bool,
}

impl LocalImageCache {
    pub fn new(store: Arc<dyn ImageCacheStore>, settings: &CacheSettings) -> Self {
        Self {
            store,
            legacy_platform_wildcard: settings.legacy_platform_wildcard,
        }
    }

    /// Most recently created local child of `parent_id` built with `config`.
    ///
    /// Children without a creation time are never selected. Among equally
    /// recent children the lowest id wins.
    pub async fn find(
        &self,
        parent_id: &str,
        config: &ContainerConfig,
        platform: &Platform,
    ) -> CacheResult<Option<ImageId>> {
        // Root images carry no parent link, so nothing can be a child of "no parent"
        if parent_id.is_empty() {
            return Ok(None);
        }

        let parent = ImageId::new(parent_id);
        self.store
            .get(&parent)
            .await
            .map_err(|source| CacheError::ParentLookup {
                id: parent.to_string(),
                source,
            })?;

        let mut best: Option<Image> = None;
        for child_id in self.store.children(&parent).await {
            let child = self
                .store
                .get(&child_id)
                .await
                .map_err(|source| CacheError::ChildLookup {
                    id: child_id.to_string(),
                    source,
                })?;

            match self.store.is_built_locally(&child_id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(id = %child_id, error = %e, "failed to check if image was built locally");
                    continue;
                }
            }

            if !platform_compatible(platform, &child.platform(), self.legacy_platform_wildcard) {
                continue;
            }
            if !compare_configs(&child.container_config, config) {
                continue;
            }
            let Some(created) = child.created else {
                continue;
            };

            let newer = match &best {
                None => true,
                Some(current) => match current.created {
                    Some(current_created) if current_created == created => child.id < current.id,
                    Some(current_created) => created > current_created,
                    None => true,
                },
            };
            if newer {
                best = Some(child);
            }
        }

        if let Some(hit) = &best {
            debug!("Local cache hit for {}: {}", parent.short(), hit.id.short());
        }
        Ok(best.map(|img| img.id))
    }
}

#[async_trait]
impl ImageCache for LocalImageCache {
    async fn get_cache(
        &mut self,
        parent_id: &str,
        config: &ContainerConfig,
        platform: &Platform,
    ) -> CacheResult<Option<ImageId>> {
        self.find(parent_id, config, platform).await
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

/// Whether an image built for `candidate` may serve a step for `requested`.
///
/// An unset requested platform means the host. Legacy images without any
/// platform only match builds for the host, and only when allowed.
pub(crate) fn platform_compatible(
    requested: &Platform,
    candidate: &Platform,
    legacy_wildcard: bool,
) -> bool {
    let host = Platform::host();
    let requested = if requested.is_unset() { &host } else { requested };

    if candidate.is_unset() {
        return legacy_wildcard && requested.matches(&host);
    }
    requested.matches(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testutil::{child_of, image, linux};
    use crate::store::MemoryStore;

    fn cache(store: &Arc<MemoryStore>) -> LocalImageCache {
        LocalImageCache::new(store.clone(), &CacheSettings::default())
    }

    async fn base(store: &MemoryStore) -> Image {
        let id = store.insert(image(&[("ADD rootfs", false)])).await.unwrap();
        store.get(&id).await.unwrap()
    }

    #[tokio::test]
    async fn finds_matching_local_child() {
        let store = Arc::new(MemoryStore::new());
        let parent = base(&store).await;
        let child = store
            .insert_local(child_of(&parent, &["RUN", "make"], Some(1)), Some(&parent.id))
            .await
            .unwrap();

        let hit = cache(&store)
            .find(parent.id.as_str(), &ContainerConfig::with_cmd(["RUN", "make"]), &linux())
            .await
            .unwrap();
        assert_eq!(hit, Some(child));
    }

    #[tokio::test]
    async fn prefers_most_recent_child() {
        let store = Arc::new(MemoryStore::new());
        let parent = base(&store).await;

        let mut older = child_of(&parent, &["RUN", "make"], Some(1));
        older.author = "older".into();
        store.insert_local(older, Some(&parent.id)).await.unwrap();
        let newer = store
            .insert_local(child_of(&parent, &["RUN", "make"], Some(5)), Some(&parent.id))
            .await
            .unwrap();

        let hit = cache(&store)
            .find(parent.id.as_str(), &ContainerConfig::with_cmd(["RUN", "make"]), &linux())
            .await
            .unwrap();
        assert_eq!(hit, Some(newer));
    }

    #[tokio::test]
    async fn equal_timestamps_pick_lowest_id() {
        let store = Arc::new(MemoryStore::new());
        let parent = base(&store).await;

        let mut ids = Vec::new();
        for author in ["a", "b", "c"] {
            let mut img = child_of(&parent, &["RUN", "make"], Some(3));
            img.author = author.into();
            ids.push(store.insert_local(img, Some(&parent.id)).await.unwrap());
        }
        ids.sort();

        let hit = cache(&store)
            .find(parent.id.as_str(), &ContainerConfig::with_cmd(["RUN", "make"]), &linux())
            .await
            .unwrap();
        assert_eq!(hit, Some(ids[0].clone()));
    }

    #[tokio::test]
    async fn skips_pulled_undated_and_mismatched_children() {
        let store = Arc::new(MemoryStore::new());
        let parent = base(&store).await;

        // pulled, not built here
        let pulled = store
            .insert(child_of(&parent, &["RUN", "make"], Some(1)))
            .await
            .unwrap();
        store.link(&pulled, &parent.id).await.unwrap();

        // no creation time
        store
            .insert_local(child_of(&parent, &["RUN", "make"], None), Some(&parent.id))
            .await
            .unwrap();

        // other platform
        let mut arm = child_of(&parent, &["RUN", "make"], Some(2));
        arm.architecture = "arm64".into();
        store.insert_local(arm, Some(&parent.id)).await.unwrap();

        // other command
        store
            .insert_local(child_of(&parent, &["RUN", "test"], Some(3)), Some(&parent.id))
            .await
            .unwrap();

        let hit = cache(&store)
            .find(parent.id.as_str(), &ContainerConfig::with_cmd(["RUN", "make"]), &linux())
            .await
            .unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn built_locally_failure_skips_candidate() {
        let store = Arc::new(MemoryStore::new());
        let parent = base(&store).await;
        let broken = store
            .insert_local(child_of(&parent, &["RUN", "make"], Some(9)), Some(&parent.id))
            .await
            .unwrap();
        let mut ok = child_of(&parent, &["RUN", "make"], Some(1));
        ok.author = "ok".into();
        let ok = store.insert_local(ok, Some(&parent.id)).await.unwrap();
        store.fail_built_locally(&broken).await;

        let hit = cache(&store)
            .find(parent.id.as_str(), &ContainerConfig::with_cmd(["RUN", "make"]), &linux())
            .await
            .unwrap();
        assert_eq!(hit, Some(ok));
    }

    #[tokio::test]
    async fn missing_parent_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let err = cache(&store)
            .find("sha256:missing", &ContainerConfig::with_cmd(["RUN", "make"]), &linux())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::ParentLookup { .. }));
        assert!(err.to_string().contains("sha256:missing"));
    }

    #[tokio::test]
    async fn empty_parent_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let hit = cache(&store)
            .find("", &ContainerConfig::with_cmd(["RUN", "make"]), &linux())
            .await
            .unwrap();
        assert_eq!(hit, None);
        assert_eq!(store.stats().get, 0);
    }

    #[test]
    fn legacy_platform_matches_host_only_when_allowed() {
        let host = Platform::host();
        let legacy = Platform::default();
        assert!(platform_compatible(&host, &legacy, true));
        assert!(!platform_compatible(&host, &legacy, false));
        assert!(platform_compatible(&Platform::default(), &host, false));

        let foreign = if host.os == "windows" {
            Platform::new("linux", "s390x")
        } else {
            Platform::new("windows", "amd64")
        };
        assert!(!platform_compatible(&foreign, &legacy, true));
    }
}
