//! Container config comparison for the local parent-chain cache
//!
//! Two configs are cache-compatible when every field that influences the
//! produced filesystem or runtime behaviour matches. Interactive configs
//! (`open_stdin`) never match.

use super::ContainerConfig;

/// Whether an image built with `stored` can stand in for a step
/// requesting `requested`
pub fn compare_configs(stored: &ContainerConfig, requested: &ContainerConfig) -> bool {
    if stored.open_stdin || requested.open_stdin {
        return false;
    }

    stored.tty == requested.tty
        && stored.user == requested.user
        && stored.working_dir == requested.working_dir
        && stored.cmd == requested.cmd
        && stored.entrypoint == requested.entrypoint
        && stored.env == requested.env
        && stored.labels == requested.labels
        && stored.exposed_ports == requested.exposed_ports
        && stored.volumes == requested.volumes
}
