//! Lineage command - show an image's parent chain

use super::resolve_image;
use crate::cache::parent_chain;
use crate::cli::args::{LineageArgs, OutputFormat};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::store::{load_snapshot, ImageCacheStore};
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ChainEntry {
    id: String,
    built_locally: bool,
    last_step: Option<String>,
}

/// Execute the lineage command
pub async fn execute(args: LineageArgs, config: &Config) -> CacheResult<()> {
    let (store, _) = load_snapshot(&args.snapshot).await?;
    let id = resolve_image(&store, &args.image).await?;
    let chain = parent_chain(&store, &id, config.cache.reject_parent_cycles).await?;

    let mut entries = Vec::with_capacity(chain.len());
    for id in chain {
        let image = store
            .get(&id)
            .await
            .map_err(|source| CacheError::ParentLookup {
                id: id.to_string(),
                source,
            })?;
        entries.push(ChainEntry {
            built_locally: store.is_built_locally(&id).await.unwrap_or(false),
            last_step: image.history.last().map(|h| h.created_by.clone()),
            id: id.to_string(),
        });
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            let ctx = UiContext::detect();
            ui::intro(&ctx, "Parent chain");
            for entry in &entries {
                let origin = if entry.built_locally { "local" } else { "pulled" };
                ui::key_value(
                    &ctx,
                    &entry.id,
                    &format!(
                        "{} ({})",
                        entry.last_step.as_deref().unwrap_or("<no history>"),
                        origin
                    ),
                );
            }
        }
    }

    Ok(())
}
