//! Integration tests for buildcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
        "images": [
            {
                "name": "base",
                "image": {
                    "os": "linux",
                    "architecture": "amd64",
                    "rootfs": { "type": "layers", "diff_ids": ["sha256:base"] },
                    "history": [ { "created_by": "ADD rootfs" } ]
                }
            },
            {
                "name": "app",
                "references": ["registry.local/app:cache"],
                "image": {
                    "os": "linux",
                    "architecture": "amd64",
                    "rootfs": { "type": "layers", "diff_ids": ["sha256:base", "sha256:deps", "sha256:src"] },
                    "history": [
                        { "created_by": "ADD rootfs" },
                        { "created_by": "RUN install-deps" },
                        { "created_by": "ENV MODE=release", "empty_layer": true },
                        { "created_by": "COPY src" }
                    ]
                }
            }
        ]
    }"#;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("store.json"), SNAPSHOT).unwrap();
            Self { dir }
        }

        fn snapshot(&self) -> PathBuf {
            self.dir.path().join("store.json")
        }

        fn config(&self) -> PathBuf {
            self.dir.path().join("config.toml")
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("buildcache");
            cmd.env("BUILDCACHE_CONFIG", self.config());
            cmd
        }
    }

    #[test]
    fn help_displays() {
        Fixture::new()
            .cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build cache"));
    }

    #[test]
    fn version_displays() {
        Fixture::new()
            .cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("buildcache"));
    }

    #[test]
    fn config_path_honours_env() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let fx = Fixture::new();
        fx.cmd().args(["config", "init"]).assert().success();
        assert!(fx.config().exists());

        fx.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("reject_parent_cycles = true"));
    }

    #[test]
    fn probe_replays_cached_build() {
        let fx = Fixture::new();
        fx.cmd()
            .arg("probe")
            .arg("--snapshot")
            .arg(fx.snapshot())
            .args(["--parent", "base", "--platform", "linux/amd64"])
            .args(["--cache-from", "registry.local/app:cache"])
            .args(["--step", "RUN install-deps"])
            .args(["--step", "ENV MODE=release"])
            .args(["--step", "COPY src"])
            .args(["--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"step\": 3"))
            .stdout(predicate::str::contains("null").not());
    }

    #[test]
    fn probe_reports_miss() {
        let fx = Fixture::new();
        fx.cmd()
            .arg("probe")
            .arg("--snapshot")
            .arg(fx.snapshot())
            .args(["--parent", "base", "--platform", "linux/amd64"])
            .args(["--cache-from", "app"])
            .args(["--step", "RUN something-else"])
            .args(["--step", "COPY src"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache miss"))
            .stdout(predicate::str::contains("0 of 2 step(s) cached"));
    }

    #[test]
    fn probe_without_sources_uses_local_cache() {
        let fx = Fixture::new();
        fx.cmd()
            .arg("probe")
            .arg("--snapshot")
            .arg(fx.snapshot())
            .args(["--parent", "base", "--platform", "linux/amd64"])
            .args(["--step", "RUN install-deps"])
            .assert()
            .success()
            .stdout(predicate::str::contains("local cache"));
    }

    #[test]
    fn probe_unknown_parent_fails() {
        let fx = Fixture::new();
        fx.cmd()
            .arg("probe")
            .arg("--snapshot")
            .arg(fx.snapshot())
            .args(["--parent", "nope", "--step", "RUN x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown image 'nope'"));
    }

    #[test]
    fn lineage_lists_single_root() {
        let fx = Fixture::new();
        fx.cmd()
            .arg("lineage")
            .arg("--snapshot")
            .arg(fx.snapshot())
            .args(["base", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ADD rootfs"));
    }

    #[test]
    fn missing_snapshot_fails() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["lineage", "--snapshot", "/nonexistent/store.json", "base"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("reading snapshot"));
    }
}
