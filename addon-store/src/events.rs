//! Push events from the backend and their reconciliation into the store.
//!
//! The backend announces workshop items on its own schedule: before anyone
//! asked for them, while a fetch is in flight, or after it finished. Each
//! announced item either completes the handle a caller is waiting on or is
//! stored so a later fetch needs no backend call.

use crate::cache::SeedOutcome;
use crate::models::WorkshopItem;
use crate::store::AddonStore;
use getset::Getters;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// An unsolicited message on the backend's notification channel.
#[derive(Debug, Clone, PartialEq, Getters)]
#[get = "pub"]
pub struct PushEvent {
    name: String,
    payload: Value,
}

impl PushEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Payload of a workshop item event: `{ "workshop": { "id": ..., ... } }`.
#[derive(Debug, Deserialize)]
struct WorkshopItemPayload {
    workshop: WorkshopItem,
}

/// Applies one event to the workshop item cache.
///
/// Returns `None` for events of another kind and for payloads that do not
/// decode.
pub(crate) fn reconcile(store: &AddonStore, event: &PushEvent) -> Option<SeedOutcome> {
    if event.name() != &store.config().workshop_event {
        log::trace!("Ignoring push event {}", event.name());
        return None;
    }

    let payload = match WorkshopItemPayload::deserialize(event.payload()) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Dropping malformed {} event: {}", event.name(), e);
            return None;
        }
    };

    let id = payload.workshop.id;
    let outcome = store.workshop_items().seed(id, payload.workshop);
    log::debug!("Workshop item {} push event: {}", id, outcome);
    Some(outcome)
}

/// Drains `events` into `store` until the channel closes.
pub(crate) async fn run(store: Arc<AddonStore>, mut events: broadcast::Receiver<PushEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                reconcile(&store, &event);
            }
            Err(RecvError::Lagged(skipped)) => {
                // Skipped items are simply not pre-seeded; fetches still work.
                log::warn!("Push event receiver lagged, {} events dropped", skipped);
            }
            Err(RecvError::Closed) => {
                log::info!("Push event channel closed, reconciler stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreConfig;
    use serde_json::json;

    #[test]
    fn test_push_event_accessors() {
        let event = PushEvent::new("WorkshopItem", json!({ "workshop": { "id": 1 } }));

        assert_eq!(event.name(), "WorkshopItem");
        assert_eq!(event.payload()["workshop"]["id"], json!(1));
    }

    #[test]
    fn test_payload_shape() {
        let payload = WorkshopItemPayload::deserialize(&json!({
            "workshop": { "id": "77", "title": "Pushed" }
        }))
        .unwrap();

        assert_eq!(payload.workshop.id.0, 77);
        assert_eq!(payload.workshop.title, "Pushed");
        assert!(WorkshopItemPayload::deserialize(&json!({ "id": 77 })).is_err());
    }

    #[test]
    fn test_custom_event_name() {
        let config = StoreConfig {
            workshop_event: "ItemUpdated".to_string(),
            ..StoreConfig::default()
        };
        let store = AddonStore::new(Arc::new(crate::tests::ScriptedBackend::default()), config);

        let default_name = PushEvent::new("WorkshopItem", json!({ "workshop": { "id": 1 } }));
        let custom_name = PushEvent::new("ItemUpdated", json!({ "workshop": { "id": 1 } }));

        assert_eq!(reconcile(&store, &default_name), None);
        assert_eq!(reconcile(&store, &custom_name), Some(SeedOutcome::Installed));
    }
}
