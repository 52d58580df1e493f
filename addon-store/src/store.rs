use crate::backend::{self, Backend, BackendRequest};
use crate::cache::{CacheStats, SeedOutcome, SingleFlightCache};
use crate::config::StoreConfig;
use crate::deferred::Deferred;
use crate::events::{self, PushEvent};
use crate::files::trim_path;
use crate::models::{AddonDetail, InstalledAddon, Page, PublishedFileId, WorkshopItem};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

/// Client-side access to installed addons and workshop items.
///
/// Each resource category has its own [`SingleFlightCache`], so a page number
/// of one listing never aliases the same page number of another. Handles are
/// returned immediately; awaiting them yields the backend's answer or a
/// pushed value, whichever settled first.
pub struct AddonStore {
    backend: Arc<dyn Backend>,
    config: StoreConfig,
    installed_pages: SingleFlightCache<u32, Page<InstalledAddon>>,
    workshop_pages: SingleFlightCache<u32, Page<WorkshopItem>>,
    installed_addons: SingleFlightCache<String, AddonDetail>,
    workshop_items: SingleFlightCache<PublishedFileId, WorkshopItem>,
    subscribed: AtomicBool,
}

impl AddonStore {
    pub fn new(backend: Arc<dyn Backend>, config: StoreConfig) -> Self {
        let cache = &config.cache;
        Self {
            installed_pages: SingleFlightCache::new("installed_pages", cache.clone()),
            workshop_pages: SingleFlightCache::new("workshop_pages", cache.clone()),
            installed_addons: SingleFlightCache::new("installed_addons", cache.clone()),
            workshop_items: SingleFlightCache::new("workshop_items", cache.clone()),
            backend,
            config,
            subscribed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// One page of the current user's published workshop items.
    pub fn fetch_my_workshop_page(&self, page: u32) -> Deferred<Page<WorkshopItem>> {
        let client = Arc::clone(&self.backend);
        self.workshop_pages.get_or_fetch(page, move || async move {
            backend::call(&*client, BackendRequest::BrowseMyWorkshop { page }).await
        })
    }

    /// One page of the addons installed on disk.
    pub fn fetch_installed_addons_page(&self, page: u32) -> Deferred<Page<InstalledAddon>> {
        let client = Arc::clone(&self.backend);
        self.installed_pages.get_or_fetch(page, move || async move {
            backend::call(&*client, BackendRequest::BrowseInstalledAddons { page }).await
        })
    }

    /// Full record of the installed addon at `path`. Trailing separators are
    /// ignored, so `addons/wire/` and `addons/wire` share one entry.
    pub fn fetch_installed_addon(&self, path: &str) -> Deferred<AddonDetail> {
        let path = trim_path(path).to_string();
        let client = Arc::clone(&self.backend);
        let request_path = path.clone();
        self.installed_addons.get_or_fetch(path, move || async move {
            backend::call(
                &*client,
                BackendRequest::GetInstalledAddon { path: request_path },
            )
            .await
        })
    }

    pub fn fetch_workshop_addon(&self, id: PublishedFileId) -> Deferred<WorkshopItem> {
        let client = Arc::clone(&self.backend);
        self.workshop_items.get_or_fetch(id, move || async move {
            backend::call(&*client, BackendRequest::GetWorkshopAddon { id }).await
        })
    }

    /// Applies a single push event. Returns what it did to the workshop item
    /// cache, or `None` if the event was not a workshop item update.
    pub fn apply_event(&self, event: &PushEvent) -> Option<SeedOutcome> {
        events::reconcile(self, event)
    }

    /// Starts reconciling `events` into this store on a background task.
    ///
    /// A store accepts one subscription for its whole lifetime; the task ends
    /// when the sending side of the channel is dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        events: broadcast::Receiver<PushEvent>,
    ) -> Result<JoinHandle<()>> {
        if self
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Refusing a second push event subscription");
            return Err(Error::AlreadySubscribed);
        }

        log::info!(
            "Reconciling `{}` push events into the workshop item cache",
            self.config.workshop_event
        );
        Ok(tokio::spawn(events::run(Arc::clone(self), events)))
    }

    pub fn installed_pages(&self) -> &SingleFlightCache<u32, Page<InstalledAddon>> {
        &self.installed_pages
    }

    pub fn workshop_pages(&self) -> &SingleFlightCache<u32, Page<WorkshopItem>> {
        &self.workshop_pages
    }

    pub fn installed_addons(&self) -> &SingleFlightCache<String, AddonDetail> {
        &self.installed_addons
    }

    pub fn workshop_items(&self) -> &SingleFlightCache<PublishedFileId, WorkshopItem> {
        &self.workshop_items
    }

    /// Forgets every cached entry, including failures, so subsequent fetches
    /// go back to the backend.
    pub fn free_caches(&self) {
        self.installed_pages.clear();
        self.workshop_pages.clear();
        self.installed_addons.clear();
        self.workshop_items.clear();
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            installed_pages: self.installed_pages.stats(),
            workshop_pages: self.workshop_pages.stats(),
            installed_addons: self.installed_addons.stats(),
            workshop_items: self.workshop_items.stats(),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        for cache in stats.caches() {
            log::info!(
                "{}: {} entries ({} pending, {} rejected), {} requests, {} backend calls, {} seeded, hit ratio {:.1}%",
                cache.name,
                cache.total_entries,
                cache.pending_entries,
                cache.rejected_entries,
                cache.total_requests,
                cache.backend_calls,
                cache.seeded_entries,
                cache.hit_ratio() * 100.0
            );
        }
    }
}

/// Statistics for all four resource caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct StoreStats {
    pub installed_pages: CacheStats,
    pub workshop_pages: CacheStats,
    pub installed_addons: CacheStats,
    pub workshop_items: CacheStats,
}

impl StoreStats {
    pub fn caches(&self) -> [&CacheStats; 4] {
        [
            &self.installed_pages,
            &self.workshop_pages,
            &self.installed_addons,
            &self.workshop_items,
        ]
    }

    pub fn backend_calls(&self) -> u64 {
        self.caches().iter().map(|cache| cache.backend_calls).sum()
    }
}
