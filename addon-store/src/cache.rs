use crate::deferred::{catch_panic, Deferred, DeferredState};
use crate::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strum_macros::Display;

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

/// Configuration for a single-flight cache
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether requests are memoized at all. When disabled, every fetch
    /// issues its own backend call and pushed values are dropped.
    pub enabled: bool,
    /// Whether a rejected handle stays cached for its key. When false the
    /// entry is dropped once rejected, so the next fetch retries.
    pub cache_failures: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_failures: true,
        }
    }
}

/// What a pushed value did to a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SeedOutcome {
    /// No handle existed; a resolved one was installed.
    Installed,
    /// A pending handle was resolved with the pushed value.
    Completed,
    /// The handle had already settled; the value was dropped.
    Ignored,
    /// Caching is disabled for this collection.
    Disabled,
}

/// Keyed single-flight cache.
///
/// Every key maps to at most one [`Deferred`]. The first fetch for a key
/// stores a pending handle and issues the backend call; later fetches for the
/// same key get that same handle back, whether it is still in flight or
/// already settled.
pub struct SingleFlightCache<K, V> {
    name: &'static str,
    slots: Arc<DashMap<K, Deferred<V>>>,
    config: CacheConfig,
    total_requests: AtomicU64,
    joined_requests: AtomicU64,
    backend_calls: AtomicU64,
    seeded_entries: AtomicU64,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            slots: Arc::new(DashMap::new()),
            config,
            total_requests: AtomicU64::new(0),
            joined_requests: AtomicU64::new(0),
            backend_calls: AtomicU64::new(0),
            seeded_entries: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the handle for `key`, calling `fetch` only if none exists.
    ///
    /// Must be called from within a Tokio runtime: the backend call runs on a
    /// spawned task and is never cancelled.
    pub fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Deferred<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if !self.config.enabled {
            self.backend_calls.fetch_add(1, Ordering::Relaxed);
            return Deferred::wrap(fetch());
        }

        // The pending handle must be in the map before the call is issued,
        // otherwise two racing fetches could both miss.
        let handle = match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.joined_requests.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "{}: reusing {} handle for key: {:?}",
                    self.name,
                    entry.get().state(),
                    key
                );
                return entry.get().clone();
            }
            Entry::Vacant(entry) => {
                let handle = Deferred::new();
                entry.insert(handle.clone());
                handle
            }
        };

        log::debug!("{}: issuing backend call for key: {:?}", self.name, key);
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        self.spawn_settlement(key, handle.clone(), fetch());

        handle
    }

    fn spawn_settlement<Fut>(&self, key: K, handle: Deferred<V>, call: Fut)
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let name = self.name;
        let slots = Arc::clone(&self.slots);
        let cache_failures = self.config.cache_failures;

        tokio::spawn(async move {
            let result = catch_panic(call).await;
            if let Err(error) = &result {
                log::debug!("{}: backend call failed for key {:?}: {}", name, key, error);
            }
            let failed = result.is_err();

            if !handle.settle(result) {
                log::debug!(
                    "{}: backend result for key {:?} arrived after the handle settled",
                    name,
                    key
                );
                return;
            }

            if failed && !cache_failures {
                // Only evict the handle this call owned; a reset may already
                // have replaced it.
                slots.remove_if(&key, |_, current| current.ptr_eq(&handle));
            }
        });
    }

    /// Completes or installs the handle for `key` with a value obtained out
    /// of band.
    pub fn seed(&self, key: K, value: V) -> SeedOutcome {
        if !self.config.enabled {
            return SeedOutcome::Disabled;
        }

        match self.slots.entry(key) {
            Entry::Occupied(mut entry) => {
                if !self.config.cache_failures && entry.get().state() == DeferredState::Rejected {
                    // The failed call is about to evict this handle; replacing
                    // it keeps the pushed value.
                    log::debug!(
                        "{}: replacing rejected key {:?} with pushed value",
                        self.name,
                        entry.key()
                    );
                    entry.insert(Deferred::resolved(value));
                    self.seeded_entries.fetch_add(1, Ordering::Relaxed);
                    SeedOutcome::Installed
                } else if entry.get().resolve(value) {
                    log::debug!("{}: completed pending key {:?}", self.name, entry.key());
                    SeedOutcome::Completed
                } else {
                    log::debug!(
                        "{}: key {:?} already {}, dropping pushed value",
                        self.name,
                        entry.key(),
                        entry.get().state()
                    );
                    SeedOutcome::Ignored
                }
            }
            Entry::Vacant(entry) => {
                log::debug!("{}: seeding key {:?}", self.name, entry.key());
                entry.insert(Deferred::resolved(value));
                self.seeded_entries.fetch_add(1, Ordering::Relaxed);
                SeedOutcome::Installed
            }
        }
    }

    /// The handle currently stored for `key`, without fetching.
    pub fn peek(&self, key: &K) -> Option<Deferred<V>> {
        self.slots.get(key).map(|entry| entry.value().clone())
    }

    /// Drops the handle for `key` so the next fetch calls the backend again.
    /// Holders of the dropped handle still observe its outcome.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.slots.remove(key).is_some();
        if removed {
            log::debug!("{}: invalidated key {:?}", self.name, key);
        }
        removed
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.slots.clear();
        log::info!("{} cache cleared", self.name);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            name: self.name.to_string(),
            total_entries: 0,
            pending_entries: 0,
            resolved_entries: 0,
            rejected_entries: 0,
            total_requests: self.total_requests.load(Ordering::Relaxed),
            joined_requests: self.joined_requests.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            seeded_entries: self.seeded_entries.load(Ordering::Relaxed),
        };

        for entry in self.slots.iter() {
            stats.total_entries += 1;
            match entry.value().state() {
                DeferredState::Pending => stats.pending_entries += 1,
                DeferredState::Resolved => stats.resolved_entries += 1,
                DeferredState::Rejected => stats.rejected_entries += 1,
            }
        }

        stats
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CacheStats {
    pub name: String,
    pub total_entries: usize,
    pub pending_entries: usize,
    pub resolved_entries: usize,
    pub rejected_entries: usize,
    pub total_requests: u64,
    /// Requests answered by an existing handle
    pub joined_requests: u64,
    pub backend_calls: u64,
    /// Entries installed by pushed values rather than fetches
    pub seeded_entries: u64,
}

impl CacheStats {
    /// Share of requests that did not need a backend call (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.joined_requests as f64 / self.total_requests as f64
        }
    }
}
