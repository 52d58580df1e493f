//! Client-side data access for installed addons and workshop items.
//!
//! Requests go to an external [`Backend`] process. Every resource is fetched at
//! most once per key: callers asking for the same page, path, or item share one
//! [`Deferred`] handle, and push events from the backend can complete those
//! handles or fill the cache before anyone asks.

pub mod backend;
pub mod cache;
pub mod config;
pub mod deferred;
mod error;
pub mod events;
pub mod files;
pub mod models;
mod store;


pub use backend::{Backend, BackendRequest};
pub use cache::{CacheConfig, CacheStats, SeedOutcome, SingleFlightCache};
pub use config::{StoreConfig, WORKSHOP_ITEM_EVENT};
pub use deferred::{Deferred, DeferredState};
pub use error::{BackendError, Error, Result};
pub use events::PushEvent;
pub use files::{file_type_info, trim_path, FileTypeInfo};
pub use models::{AddonDetail, AddonEntry, AddonMetadata, InstalledAddon, Page, PublishedFileId, WorkshopItem};
pub use store::{AddonStore, StoreStats};

/// Thread-safe wrapper for the store
pub type SharedAddonStore = std::sync::Arc<AddonStore>;
