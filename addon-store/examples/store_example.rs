use addon_store::{
    AddonStore, Backend, BackendError, BackendRequest, PublishedFileId, PushEvent, StoreConfig,
    WORKSHOP_ITEM_EVENT,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Stands in for the backend process with a fixed catalog and some latency.
struct FakeBackend;

#[async_trait]
impl Backend for FakeBackend {
    async fn invoke(&self, request: BackendRequest) -> Result<Value, BackendError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        match request {
            BackendRequest::BrowseInstalledAddons { page } => Ok(json!({
                "total": 2,
                "items": [
                    { "path": format!("addons/page{}_a.gma", page), "size": 1024 },
                    { "path": format!("addons/page{}_b.gma", page), "size": 2048 }
                ]
            })),
            BackendRequest::GetWorkshopAddon { id } => {
                Ok(json!({ "id": id, "title": format!("Workshop item {}", id) }))
            }
            other => Err(BackendError::new(format!("{} is not available offline", other.name()))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let config = StoreConfig::load(None)?;
    let store = Arc::new(AddonStore::new(Arc::new(FakeBackend), config));

    let (events, receiver) = broadcast::channel(64);
    store.subscribe(receiver)?;

    println!("=== Single flight ===");
    let start = std::time::Instant::now();
    let first = store.fetch_installed_addons_page(1);
    let second = store.fetch_installed_addons_page(1);
    let (first, second) = (first.await?, second.await?);
    println!(
        "Two fetches of page 1 took {:?} and returned {} / {} items",
        start.elapsed(),
        first.items.len(),
        second.items.len()
    );

    println!("\n=== Push before pull ===");
    events.send(PushEvent::new(
        WORKSHOP_ITEM_EVENT,
        json!({ "workshop": { "id": 4242, "title": "Pushed by the backend" } }),
    ))?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let start = std::time::Instant::now();
    let item = store.fetch_workshop_addon(PublishedFileId(4242)).await?;
    println!("Fetched '{}' in {:?}", item.title, start.elapsed());

    println!("\n=== Cached failure ===");
    match store.fetch_my_workshop_page(1).await {
        Ok(page) => println!("Unexpected page with {} items", page.items.len()),
        Err(e) => println!("Fetch failed: {}", e),
    }

    println!("\n=== Statistics ===");
    for cache in store.stats().caches() {
        println!("{:?}", cache);
    }

    store.free_caches();
    println!("Caches freed, backend calls so far: {}", store.stats().backend_calls());

    Ok(())
}
