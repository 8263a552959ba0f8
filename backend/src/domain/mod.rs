//! Domain services and models.

pub mod aggregation;
pub mod cache;
pub mod event_service;
pub mod insight_service;
pub mod models;
pub mod session;

pub use cache::CacheCoordinator;
pub use event_service::{AllData, EventService, QueryMetrics};
pub use insight_service::{InsightConfig, InsightOutcome, InsightService};
pub use session::SelectedChildSession;
