//! # Sproutlog Backend
//!
//! Data core for the infant-care tracking app: a freshness-coordinated
//! cache over a remote document store, per-event-type data access,
//! time-windowed aggregation for the trend charts, the insight request
//! builder, and the selected-child session.
//!
//! Screens, navigation, notifications, and report rendering live in the
//! presentation layers; they talk to this crate through [`Backend`].

use std::sync::Arc;

pub mod domain;
pub mod errors;
pub mod storage;

use domain::{EventService, InsightConfig, InsightService, SelectedChildSession};
use storage::{AuthProvider, DocumentStore, KeyValueStore};

/// Main backend struct that wires the services to their collaborators.
pub struct Backend {
    pub events: EventService,
    pub session: SelectedChildSession,
    pub insight: InsightService,
}

impl Backend {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        key_values: Arc<dyn KeyValueStore>,
        auth: Arc<dyn AuthProvider>,
        insight_config: InsightConfig,
    ) -> Self {
        let events = EventService::new(documents, key_values.clone(), auth);
        let session = SelectedChildSession::new(key_values);
        let insight = InsightService::new(insight_config);
        Self {
            events,
            session,
            insight,
        }
    }
}
