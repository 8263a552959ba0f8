//! Selected-child session.
//!
//! Persists which child the UI is focused on across app restarts. On every
//! load (triggered on UI-focus transitions, not just app start) the stored
//! pointer is re-validated against the children the caller can currently
//! access; a stale pointer is cleared rather than returned.

use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

use crate::domain::event_service::EventService;
use crate::domain::models::child::Child;
use crate::errors::DataError;
use crate::storage::KeyValueStore;

const SELECTED_CHILD_KEY: &str = "selected_child";

/// Session state for the currently selected child.
pub struct SelectedChildSession {
    store: Arc<dyn KeyValueStore>,
    current: Mutex<Option<Child>>,
}

impl SelectedChildSession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: Mutex::new(None),
        }
    }

    /// The in-memory selection, without touching storage.
    pub fn current(&self) -> Option<Child> {
        self.current.lock().unwrap().clone()
    }

    /// Load the persisted selection and validate it still exists among the
    /// caller's accessible children. A pointer that fails validation is
    /// cleared and `None` is returned.
    pub async fn load(&self, events: &EventService) -> Result<Option<Child>, DataError> {
        let raw = match self.store.get_item(SELECTED_CHILD_KEY).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Failed to read selected child pointer: {}", err);
                return Ok(None);
            }
        };
        let Some(raw) = raw else {
            debug!("No selected child persisted");
            *self.current.lock().unwrap() = None;
            return Ok(None);
        };

        let stored: Child = match serde_json::from_str(&raw) {
            Ok(child) => child,
            Err(err) => {
                warn!("Discarding undecodable selected child pointer: {}", err);
                self.clear_pointer().await;
                return Ok(None);
            }
        };

        let accessible = events.fetch_children().await?;
        match accessible.into_iter().find(|child| child.id == stored.id) {
            Some(child) => {
                debug!("Selected child {} validated", child.id);
                *self.current.lock().unwrap() = Some(child.clone());
                Ok(Some(child))
            }
            None => {
                info!("Selected child {} no longer accessible; clearing", stored.id);
                self.clear_pointer().await;
                Ok(None)
            }
        }
    }

    /// Persist (or clear) the selection, then update the in-memory state so
    /// callers never observe the two halves disagreeing.
    pub async fn save(&self, child: Option<Child>) {
        match &child {
            Some(child) => {
                match serde_json::to_string(child) {
                    Ok(serialized) => {
                        if let Err(err) = self.store.set_item(SELECTED_CHILD_KEY, &serialized).await
                        {
                            warn!("Failed to persist selected child: {}", err);
                        }
                    }
                    Err(err) => warn!("Failed to serialize selected child: {}", err),
                }
                info!("Selected child set to {}", child.id);
            }
            None => {
                if let Err(err) = self.store.remove_item(SELECTED_CHILD_KEY).await {
                    warn!("Failed to clear selected child: {}", err);
                }
                info!("Selected child cleared");
            }
        }
        *self.current.lock().unwrap() = child;
    }

    async fn clear_pointer(&self) {
        if let Err(err) = self.store.remove_item(SELECTED_CHILD_KEY).await {
            warn!("Failed to clear stale selected child pointer: {}", err);
        }
        *self.current.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::models::child::Sex;
    use crate::storage::memory::{MemoryDocumentStore, MemoryKeyValueStore, StaticAuthProvider};

    struct Fixture {
        key_values: Arc<MemoryKeyValueStore>,
        events: EventService,
        session: SelectedChildSession,
    }

    fn setup() -> Fixture {
        let documents = Arc::new(MemoryDocumentStore::new());
        let key_values = Arc::new(MemoryKeyValueStore::new());
        let auth = Arc::new(StaticAuthProvider::signed_in("amy@example.com"));
        let events = EventService::new(documents, key_values.clone(), auth);
        let session = SelectedChildSession::new(key_values.clone());
        Fixture {
            key_values,
            events,
            session,
        }
    }

    async fn create_child(events: &EventService) -> Child {
        events
            .create_child(
                "Maya",
                "Quinn",
                NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
                Sex::Female,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let fixture = setup();
        let child = create_child(&fixture.events).await;

        fixture.session.save(Some(child.clone())).await;
        assert_eq!(fixture.session.current(), Some(child.clone()));

        let loaded = fixture.session.load(&fixture.events).await.unwrap();
        assert_eq!(loaded, Some(child));
    }

    #[tokio::test]
    async fn test_load_without_pointer() {
        let fixture = setup();
        let loaded = fixture.session.load(&fixture.events).await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn test_stale_pointer_is_cleared() {
        let fixture = setup();
        let child = create_child(&fixture.events).await;
        fixture.session.save(Some(child.clone())).await;

        // The child is deleted out from under the session
        fixture.events.remove_child_or_access(&child).await.unwrap();

        let loaded = fixture.session.load(&fixture.events).await.unwrap();
        assert_eq!(loaded, None);
        assert_eq!(fixture.session.current(), None);
        assert_eq!(
            fixture.key_values.get_item(SELECTED_CHILD_KEY).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_save_none_clears_pointer() {
        let fixture = setup();
        let child = create_child(&fixture.events).await;
        fixture.session.save(Some(child)).await;

        fixture.session.save(None).await;
        assert_eq!(fixture.session.current(), None);
        assert_eq!(
            fixture.key_values.get_item(SELECTED_CHILD_KEY).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_undecodable_pointer_is_cleared() {
        let fixture = setup();
        fixture
            .key_values
            .set_item(SELECTED_CHILD_KEY, "not json")
            .await
            .unwrap();

        let loaded = fixture.session.load(&fixture.events).await.unwrap();
        assert_eq!(loaded, None);
        assert_eq!(
            fixture.key_values.get_item(SELECTED_CHILD_KEY).await.unwrap(),
            None
        );
    }
}
