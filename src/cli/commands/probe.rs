//! Probe command - replay build steps against the cache

use super::resolve_image;
use crate::cache;
use crate::cli::args::{OutputFormat, ProbeArgs};
use crate::config::Config;
use crate::error::CacheResult;
use crate::image::{ContainerConfig, ImageId, Platform};
use crate::store::load_snapshot;
use crate::ui::{self, UiContext};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Outcome of one probed step
#[derive(Debug, Serialize)]
struct StepOutcome {
    step: usize,
    command: String,
    image: Option<ImageId>,
}

/// Execute the probe command
pub async fn execute(args: ProbeArgs, config: &Config) -> CacheResult<()> {
    let (store, _) = load_snapshot(&args.snapshot).await?;
    let store = Arc::new(store);

    let mut parent = match &args.parent {
        Some(name) => resolve_image(&store, name).await?,
        None => ImageId::default(),
    };
    let platform = args.platform.clone().unwrap_or_else(Platform::host);
    let cache_from = if args.cache_from.is_empty() {
        config.cache.cache_from.clone()
    } else {
        args.cache_from.clone()
    };

    let mut cache = cache::new(store.clone(), &cache_from, &config.cache).await?;
    debug!("Probing {} step(s) with {} cache", args.steps.len(), cache.kind());

    let mut outcomes = Vec::new();
    for (index, step) in args.steps.iter().enumerate() {
        let step_config = ContainerConfig::with_cmd(step.split_whitespace());
        let hit = cache
            .get_cache(parent.as_str(), &step_config, &platform)
            .await?;

        outcomes.push(StepOutcome {
            step: index + 1,
            command: step_config.joined_cmd(),
            image: hit.clone(),
        });

        match hit {
            Some(id) => parent = id,
            // a miss means the step runs; later steps have nothing to build on
            None => break,
        }
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        OutputFormat::Text => print_text(&outcomes, args.steps.len(), cache.kind()),
    }

    let stats = store.stats();
    debug!(
        "Store calls: get={} children={} get_parent={} create={}",
        stats.get, stats.children, stats.get_parent, stats.create
    );
    Ok(())
}

fn print_text(outcomes: &[StepOutcome], total: usize, kind: &str) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, &format!("Cache probe ({} cache)", kind));

    for outcome in outcomes {
        let label = format!("[{}/{}] {}", outcome.step, total, outcome.command);
        match &outcome.image {
            Some(id) => ui::step_ok_detail(&ctx, &label, id.as_str()),
            None => ui::step_warn_hint(&ctx, &label, "cache miss"),
        }
    }

    let skipped = total - outcomes.len();
    if skipped > 0 {
        ui::remark(&ctx, &format!("{} step(s) after the miss not evaluated", skipped));
    }

    let hits = outcomes.iter().filter(|o| o.image.is_some()).count();
    ui::outro_success(&ctx, &format!("{} of {} step(s) cached", hits, total));
}
