//! buildcache - image build cache resolution
//!
//! Given a parent image and the configuration of the next build step,
//! finds an image whose filesystem already holds that step's result:
//! a locally built child of the parent, or a step recorded in the history
//! of a `--cache-from` source image, restored into the store on demand.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod store;
pub mod ui;

pub use cache::{HistoryImageCache, ImageCache, LocalImageCache};
pub use error::{CacheError, CacheResult, StoreError, StoreResult};
pub use image::{ContainerConfig, DiffId, History, Image, ImageId, Platform, RootFs};
pub use store::{ImageCacheStore, MemoryStore};
