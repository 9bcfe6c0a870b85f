//! Parent-link traversal
//!
//! Parent links are mutable store metadata, so a corrupt store can contain
//! cycles. Walks keep a visited set and either fail or stop on a revisit.

use crate::error::{CacheError, CacheResult};
use crate::image::ImageId;
use crate::store::ImageCacheStore;
use std::collections::HashSet;
use tracing::debug;

/// Whether `candidate` is `descendant` itself or one of its ancestors.
///
/// A parent lookup failure ends the walk with `false`.
pub async fn is_ancestor_or_self(
    store: &dyn ImageCacheStore,
    descendant: &ImageId,
    candidate: &ImageId,
    reject_cycles: bool,
) -> CacheResult<bool> {
    let mut visited = HashSet::new();
    let mut current = descendant.clone();

    loop {
        if &current == candidate {
            return Ok(true);
        }
        if !visited.insert(current.clone()) {
            return cycle_detected(descendant, reject_cycles).map(|_| false);
        }

        match store.get_parent(&current).await {
            Ok(Some(parent)) => current = parent,
            Ok(None) => return Ok(false),
            Err(e) => {
                debug!("Parent lookup for {} failed, ending walk: {}", current.short(), e);
                return Ok(false);
            }
        }
    }
}

/// `id` followed by each of its ancestors, nearest first
pub async fn parent_chain(
    store: &dyn ImageCacheStore,
    id: &ImageId,
    reject_cycles: bool,
) -> CacheResult<Vec<ImageId>> {
    let mut chain = vec![id.clone()];
    let mut visited: HashSet<ImageId> = chain.iter().cloned().collect();
    let mut current = id.clone();

    loop {
        let parent = store
            .get_parent(&current)
            .await
            .map_err(|source| CacheError::ParentLookup {
                id: current.to_string(),
                source,
            })?;

        match parent {
            Some(parent) if visited.insert(parent.clone()) => {
                chain.push(parent.clone());
                current = parent;
            }
            Some(_) => {
                cycle_detected(id, reject_cycles)?;
                return Ok(chain);
            }
            None => return Ok(chain),
        }
    }
}

fn cycle_detected(start: &ImageId, reject_cycles: bool) -> CacheResult<()> {
    if reject_cycles {
        return Err(CacheError::ParentCycle {
            id: start.to_string(),
        });
    }
    debug!("Parent links starting at {} loop, ending walk", start.short());
    Ok(())
}
