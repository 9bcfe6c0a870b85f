//! Image fixtures shared by the cache tests

use crate::image::{ContainerConfig, DiffId, History, Image, Platform, RootFs};
use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub(crate) fn linux() -> Platform {
    Platform::new("linux", "amd64")
}

pub(crate) fn layer_for(cmd: &str) -> DiffId {
    DiffId::new(format!("sha256:layer-{}", cmd.replace(' ', "-")))
}

/// Image built from `steps`, one layer per non-empty step
pub(crate) fn image(steps: &[(&str, bool)]) -> Image {
    let mut img = Image {
        os: "linux".into(),
        architecture: "amd64".into(),
        author: "builder".into(),
        rootfs: RootFs::new(),
        ..Image::default()
    };
    for (i, (cmd, empty)) in steps.iter().enumerate() {
        img.history
            .push(History::new(*cmd, *empty).at(ts(i as i64)));
        if !empty {
            img.rootfs.append(layer_for(cmd));
        }
    }
    img.created = img.history.last().and_then(|h| h.created);
    img
}

/// `parent` plus one more step, recorded as if built locally with `cmd`
pub(crate) fn child_of(parent: &Image, cmd: &[&str], created: Option<i64>) -> Image {
    let joined = cmd.join(" ");
    let mut img = parent.clone();
    img.history.push(History::new(joined.clone(), false).at(ts(100)));
    img.rootfs.append(layer_for(&joined));
    img.container_config = ContainerConfig::with_cmd(cmd.iter().copied());
    img.config = Some(img.container_config.clone());
    img.created = created.map(ts);
    img
}
