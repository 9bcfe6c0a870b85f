//! Image data model
//!
//! Images are immutable, content-addressed records. The identity of an
//! image is the SHA256 digest of its canonical JSON form; the parent link
//! is store metadata and never part of the digest.

pub mod compare;
pub mod platform;

pub use compare::compare_configs;
pub use platform::Platform;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Digest algorithm prefix used for image and layer identities
const DIGEST_PREFIX: &str = "sha256:";

/// Content-addressed image identity (`sha256:<hex>`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Wrap an existing identity string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identity from raw content
    pub fn from_content(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        Self(format!("{}{}", DIGEST_PREFIX, hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First 12 hex characters, for display
    pub fn short(&self) -> &str {
        let hex = self.0.strip_prefix(DIGEST_PREFIX).unwrap_or(&self.0);
        &hex[..hex.len().min(12)]
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Content hash of a single layer's filesystem delta
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffId(String);

impl DiffId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One build step's recorded metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct History {
    /// When the step ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Command that produced the step
    #[serde(skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,

    /// The step added no filesystem diff
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub empty_layer: bool,
}

impl History {
    /// Create a history entry for a command
    pub fn new(created_by: impl Into<String>, empty_layer: bool) -> Self {
        Self {
            created_by: created_by.into(),
            empty_layer,
            ..Self::default()
        }
    }

    /// Set the creation timestamp
    pub fn at(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Field-by-field equality over every recorded attribute
    pub fn same_step(&self, other: &History) -> bool {
        self.created == other.created
            && self.created_by == other.created_by
            && self.author == other.author
            && self.comment == other.comment
            && self.empty_layer == other.empty_layer
    }
}

/// Ordered list of layer diff ids composing an image's filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type")]
    pub fs_type: String,

    #[serde(default)]
    pub diff_ids: Vec<DiffId>,
}

impl RootFs {
    /// Create an empty layered rootfs
    pub fn new() -> Self {
        Self {
            fs_type: "layers".to_string(),
            diff_ids: Vec::new(),
        }
    }

    pub fn append(&mut self, diff_id: DiffId) {
        self.diff_ids.push(diff_id);
    }

    /// Whether every layer of `self` is, in order, a leading layer of `other`
    pub fn is_prefix_of(&self, other: &RootFs) -> bool {
        other.diff_ids.starts_with(&self.diff_ids)
    }
}

impl Default for RootFs {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime configuration of a build step or container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub exposed_ports: BTreeSet<String>,
    pub volumes: BTreeSet<String>,
    pub working_dir: String,
    pub user: String,
    pub tty: bool,
    pub open_stdin: bool,
}

impl ContainerConfig {
    /// Config consisting of a command only
    pub fn with_cmd<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Command tokens joined with single spaces, as recorded in history
    pub fn joined_cmd(&self) -> String {
        self.cmd.join(" ")
    }
}

/// Immutable image record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    /// Computed identity, assigned by the store
    #[serde(skip)]
    pub id: ImageId,

    pub docker_version: String,
    pub author: String,
    pub created: Option<DateTime<Utc>>,

    /// Declared image config
    pub config: Option<ContainerConfig>,

    /// Snapshot of the config of the container that produced the image
    pub container_config: ContainerConfig,

    pub architecture: String,
    pub os: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub os_features: Vec<String>,

    pub rootfs: RootFs,
    pub history: Vec<History>,
}

impl Image {
    /// Identity this image's content hashes to
    pub fn compute_id(&self) -> Result<ImageId, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(ImageId::from_content(&bytes))
    }

    /// Return the image with its computed identity assigned
    pub fn identified(mut self) -> Result<Self, serde_json::Error> {
        self.id = self.compute_id()?;
        Ok(self)
    }

    /// Platform the image was built for
    pub fn platform(&self) -> Platform {
        Platform {
            os: self.os.clone(),
            architecture: self.architecture.clone(),
            variant: self.variant.clone(),
        }
    }

    /// Number of history entries that contributed a filesystem layer
    pub fn non_empty_layer_count(&self) -> usize {
        self.history.iter().filter(|h| !h.empty_layer).count()
    }

    /// Whether history and rootfs are in lockstep
    pub fn layers_consistent(&self) -> bool {
        self.non_empty_layer_count() == self.rootfs.diff_ids.len()
    }
}
