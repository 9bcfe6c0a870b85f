//! buildcache - image build cache resolution
//!
//! CLI entry point that dispatches to subcommands.

use buildcache::cli::{Cli, Commands};
use buildcache::config::ConfigManager;
use buildcache::error::CacheResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("buildcache=warn"),
        1 => EnvFilter::new("buildcache=info"),
        _ => EnvFilter::new("buildcache=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    match cli.command {
        Commands::Probe(args) => buildcache::cli::commands::probe(args, &config).await,
        Commands::Lineage(args) => buildcache::cli::commands::lineage(args, &config).await,
        Commands::Config(args) => {
            buildcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
