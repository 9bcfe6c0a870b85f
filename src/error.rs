//! Error types for buildcache
//!
//! All modules use `CacheResult<T>` as their return type. Store
//! collaborators report failures through [`StoreError`], which the cache
//! wraps with the image ids involved.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for image store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by an image store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the error is a cancellation or deadline signal rather than
    /// an ordinary lookup failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// All errors that can occur while resolving the build cache
#[derive(Error, Debug)]
pub enum CacheError {
    // Lookup errors
    #[error("unable to find image {id}: {source}")]
    ParentLookup {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("unable to find child image {id}: {source}")]
    ChildLookup {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("parent links of {id} form a cycle")]
    ParentCycle { id: String },

    // Restoration errors
    #[error("failed to restore cached image from {parent:?} to {target}: {source}")]
    Restore {
        parent: String,
        target: String,
        #[source]
        source: Box<CacheError>,
    },

    #[error("failed to create cache image: {0}")]
    Create(#[source] StoreError),

    #[error("inconsistent image {id}: {reason}")]
    InconsistentImage { id: String, reason: String },

    // Seeding errors
    #[error("cache source lookup for {reference} aborted: {source}")]
    Seed {
        reference: String,
        #[source]
        source: StoreError,
    },

    // Snapshot errors
    #[error("invalid snapshot {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    InvalidArgument(String),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an inconsistent image error
    pub fn inconsistent(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InconsistentImage {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error stems from a cancelled or timed out store call
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Seed { source, .. }
            | Self::ParentLookup { source, .. }
            | Self::ChildLookup { source, .. }
            | Self::Create(source) => source.is_cancellation(),
            Self::Restore { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ParentCycle { .. } => {
                Some("The image store's parent links are corrupt; remove the affected images")
            }
            Self::InconsistentImage { .. } => {
                Some("Image history and rootfs layers disagree; re-pull the cache source")
            }
            Self::Seed { .. } => Some("Raise cache.seed_timeout_secs or check the references"),
            Self::ConfigInvalid { .. } => Some("Run: buildcache config show"),
            _ => None,
        }
    }
}
