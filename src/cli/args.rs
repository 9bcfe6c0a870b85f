//! CLI argument definitions using clap derive

use crate::image::Platform;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// buildcache - image build cache resolution
///
/// Replays build steps against an image store snapshot and reports which
/// steps would be served from the build cache.
#[derive(Parser, Debug)]
#[command(name = "buildcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BUILDCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve cache hits for a sequence of build steps
    Probe(ProbeArgs),

    /// Show the parent chain of an image
    Lineage(LineageArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the probe command
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Image store snapshot (JSON)
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Image the first step builds on (snapshot name, reference or id)
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Build step command, whitespace separated (repeat for each step)
    #[arg(long = "step", required = true)]
    pub steps: Vec<String>,

    /// Target platform (os/arch[/variant], defaults to host)
    #[arg(long, value_parser = parse_platform)]
    pub platform: Option<Platform>,

    /// Cache source references (overrides cache.cache_from)
    #[arg(long)]
    pub cache_from: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the lineage command
#[derive(Parser, Debug)]
pub struct LineageArgs {
    /// Image store snapshot (JSON)
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Image to start from (snapshot name, reference or id)
    pub image: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for probe and lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse()
}
