//! Restoration of history-matched images
//!
//! When a cache source matches a step in the middle of its history, the
//! matched prefix has no image of its own yet. Restoration synthesizes one
//! from the parent plus the matched history entry and its layer, and
//! persists it so later lookups find it through the parent chain.

use crate::error::{CacheError, CacheResult};
use crate::image::{ContainerConfig, DiffId, Image, ImageId, RootFs};
use crate::store::ImageCacheStore;
use tracing::debug;

/// Layer contributed by `image.history[index]`, `None` for empty-layer steps.
///
/// The layer's position in the rootfs equals the number of non-empty
/// history entries before `index`.
pub fn layer_for_history_index(image: &Image, index: usize) -> CacheResult<Option<DiffId>> {
    let entry = image.history.get(index).ok_or_else(|| {
        CacheError::inconsistent(
            image.id.as_str(),
            format!(
                "history index {} out of range ({} entries)",
                index,
                image.history.len()
            ),
        )
    })?;
    if entry.empty_layer {
        return Ok(None);
    }

    let layer_index = image.history[..index]
        .iter()
        .filter(|h| !h.empty_layer)
        .count();

    image
        .rootfs
        .diff_ids
        .get(layer_index)
        .cloned()
        .map(Some)
        .ok_or_else(|| {
            CacheError::inconsistent(
                image.id.as_str(),
                format!(
                    "history entry {} maps to layer {} but rootfs has {} layers",
                    index,
                    layer_index,
                    image.rootfs.diff_ids.len()
                ),
            )
        })
}

/// Create the image for `parent` + `target.history[len(parent.history)]`.
///
/// The restored image declares the requested `config`, not the target's,
/// and records `builder_version` as the version that produced it.
pub async fn restore_cached_image(
    store: &dyn ImageCacheStore,
    parent: Option<&Image>,
    target: &Image,
    config: &ContainerConfig,
    builder_version: &str,
) -> CacheResult<ImageId> {
    let (mut history, mut rootfs) = match parent {
        Some(parent) => (parent.history.clone(), parent.rootfs.clone()),
        None => (Vec::new(), RootFs::new()),
    };
    let len_history = history.len();

    let entry = target.history.get(len_history).cloned().ok_or_else(|| {
        CacheError::inconsistent(
            target.id.as_str(),
            format!("no history entry at index {}", len_history),
        )
    })?;
    let layer = layer_for_history_index(target, len_history)?;
    if let Some(layer) = &layer {
        rootfs.append(layer.clone());
    }

    let created = entry.created;
    history.push(entry);

    let restored = Image {
        docker_version: builder_version.to_string(),
        author: target.author.clone(),
        created,
        config: Some(config.clone()),
        container_config: config.clone(),
        architecture: target.architecture.clone(),
        os: target.os.clone(),
        variant: target.variant.clone(),
        os_version: target.os_version.clone(),
        os_features: target.os_features.clone(),
        rootfs,
        history,
        ..Image::default()
    };

    let id = store
        .create(parent, restored, layer.as_ref())
        .await
        .map_err(CacheError::Create)?;

    debug!(
        "Restored {} from step {} of {}",
        id.short(),
        len_history,
        target.id.short()
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testutil::{image, layer_for};
    use crate::store::MemoryStore;

    #[test]
    fn layer_index_skips_empty_layers() {
        let img = image(&[("A", false), ("ENV x", true), ("B", false), ("CMD y", true)]);

        assert_eq!(layer_for_history_index(&img, 0).unwrap(), Some(layer_for("A")));
        assert_eq!(layer_for_history_index(&img, 1).unwrap(), None);
        assert_eq!(layer_for_history_index(&img, 2).unwrap(), Some(layer_for("B")));
        assert_eq!(layer_for_history_index(&img, 3).unwrap(), None);
    }

    #[test]
    fn layer_index_out_of_lockstep_is_an_error() {
        let mut img = image(&[("A", false), ("B", false)]);
        img.rootfs.diff_ids.truncate(1);

        let err = layer_for_history_index(&img, 1).unwrap_err();
        assert!(matches!(err, CacheError::InconsistentImage { .. }));
        assert!(layer_for_history_index(&img, 5).is_err());
    }

    #[tokio::test]
    async fn restores_first_step_without_parent() {
        let store = MemoryStore::new();
        let target_id = store
            .insert(image(&[("RUN x", false), ("RUN y", false), ("RUN z", false)]))
            .await
            .unwrap();
        let target = store.get(&target_id).await.unwrap();
        let requested = ContainerConfig::with_cmd(["RUN", "x"]);

        let id = restore_cached_image(&store, None, &target, &requested, "9.9.9")
            .await
            .unwrap();
        let restored = store.get(&id).await.unwrap();

        assert_eq!(restored.history.len(), 1);
        assert!(restored.history[0].same_step(&target.history[0]));
        assert_eq!(restored.rootfs.diff_ids, vec![target.rootfs.diff_ids[0].clone()]);
        assert_eq!(restored.config, Some(requested.clone()));
        assert_eq!(restored.container_config, requested);
        assert_eq!(restored.docker_version, "9.9.9");
        assert_eq!(restored.os, target.os);
        assert_eq!(restored.author, target.author);
        assert_eq!(restored.created, target.history[0].created);
        assert_eq!(store.get_parent(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn restores_empty_layer_step_on_parent() {
        let store = MemoryStore::new();
        let steps = [("RUN x", false), ("ENV a=b", true), ("RUN z", false)];
        let target_id = store.insert(image(&steps)).await.unwrap();
        let target = store.get(&target_id).await.unwrap();
        let parent_id = store.insert(image(&steps[..1])).await.unwrap();
        let parent = store.get(&parent_id).await.unwrap();

        let id = restore_cached_image(
            &store,
            Some(&parent),
            &target,
            &ContainerConfig::with_cmd(["ENV", "a=b"]),
            "1.0.0",
        )
        .await
        .unwrap();
        let restored = store.get(&id).await.unwrap();

        assert_eq!(restored.history.len(), 2);
        assert_eq!(restored.rootfs, parent.rootfs);
        assert_eq!(store.get_parent(&id).await.unwrap(), Some(parent_id));
    }
}
