//! Event data access.
//!
//! CRUD per event type against the remote document store, with every read
//! going through the cache coordinator and every write invalidating it.
//! The remote store keeps temporal fields in its native epoch-millis type;
//! this layer converts them to and from `chrono` values at the boundary.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::cache::CacheCoordinator;
use crate::domain::models::child::{Child, Relationship, Sex};
use crate::domain::models::events::{
    ActivityEvent, DiaperEvent, EventKind, EventRecord, FeedEvent, MilestoneEvent, SleepEvent,
    WeightEvent,
};
use crate::errors::DataError;
use crate::storage::{
    AuthProvider, Document, DocumentStore, FieldMutation, KeyValueStore, UserAccount, WhereClause,
};

const CHILDREN_COLLECTION: &str = "children";

fn subcollection(child_id: &str, kind: EventKind) -> String {
    format!("{}/{}/{}", CHILDREN_COLLECTION, child_id, kind.as_str())
}

fn child_path(child_id: &str) -> String {
    format!("{}/{}", CHILDREN_COLLECTION, child_id)
}

/// Remote-query counters for the current session.
///
/// An explicit per-session object rather than ambient state; the owner
/// resets it when the selected child changes.
#[derive(Debug, Default)]
pub struct QueryMetrics {
    remote_queries: AtomicU64,
}

impl QueryMetrics {
    pub fn record_remote_query(&self) {
        self.remote_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remote_queries(&self) -> u64 {
        self.remote_queries.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.remote_queries.store(0, Ordering::Relaxed);
    }
}

/// All six event datasets for one child, fetched jointly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllData {
    pub sleep: Vec<SleepEvent>,
    pub feeds: Vec<FeedEvent>,
    pub diapers: Vec<DiaperEvent>,
    pub activities: Vec<ActivityEvent>,
    pub milestones: Vec<MilestoneEvent>,
    pub weights: Vec<WeightEvent>,
}

/// Service for reading and writing event records and child documents.
#[derive(Clone)]
pub struct EventService {
    documents: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
    cache: CacheCoordinator,
    metrics: Arc<QueryMetrics>,
}

impl EventService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        key_values: Arc<dyn KeyValueStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            documents,
            auth,
            cache: CacheCoordinator::new(key_values),
            metrics: Arc::new(QueryMetrics::default()),
        }
    }

    pub fn metrics(&self) -> &QueryMetrics {
        &self.metrics
    }

    /// Clear session metrics; called when the selected child changes.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn require_user(&self) -> Result<UserAccount, DataError> {
        self.auth.current_user().ok_or(DataError::Unauthenticated)
    }

    /// Persist one event record and invalidate the child's cache.
    ///
    /// The record is echoed back to the caller; event documents carry no
    /// client-visible identity beyond their fields.
    pub async fn add_event<T: EventRecord>(&self, event: &T) -> Result<T, DataError> {
        self.require_user()?;
        let child_id = event.child_id().to_string();
        let fields = to_store_fields(event)?;

        self.documents
            .add_document(&subcollection(&child_id, T::KIND), fields)
            .await
            .map_err(DataError::RemoteWrite)?;
        info!("Stored {} event for {}", T::KIND.as_str(), child_id);

        // A write to any one kind invalidates all cached kinds for the child
        self.cache.invalidate(&child_id).await;
        Ok(event.clone())
    }

    /// Fetch one child's records of a given kind, serving from cache while
    /// the freshness window holds.
    pub async fn events<T: EventRecord>(&self, child_id: &str) -> Result<Vec<T>, DataError> {
        self.require_user()?;

        if self.cache.is_fresh(child_id).await {
            if let Some(cached) = self.cache.read_events::<T>(child_id).await {
                return Ok(cached);
            }
        }

        let documents = self
            .documents
            .query_documents(&subcollection(child_id, T::KIND), &[])
            .await
            .map_err(DataError::RemoteRead)?;
        self.metrics.record_remote_query();

        let mut events = Vec::with_capacity(documents.len());
        for document in &documents {
            match from_store_document::<T>(document) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(
                        "Skipping undecodable {} document {}: {}",
                        T::KIND.as_str(),
                        document.id,
                        err
                    );
                }
            }
        }
        events.sort_by_key(|event| event.occurred_at());
        debug!(
            "Fetched {} {} records for {}",
            events.len(),
            T::KIND.as_str(),
            child_id
        );

        self.cache.write_events(child_id, &events).await;
        self.cache.mark_fetched(child_id).await;
        Ok(events)
    }

    pub async fn add_sleep(&self, event: &SleepEvent) -> Result<SleepEvent, DataError> {
        self.add_event(event).await
    }

    pub async fn add_feed(&self, event: &FeedEvent) -> Result<FeedEvent, DataError> {
        self.add_event(event).await
    }

    pub async fn add_diaper(&self, event: &DiaperEvent) -> Result<DiaperEvent, DataError> {
        self.add_event(event).await
    }

    pub async fn add_activity(&self, event: &ActivityEvent) -> Result<ActivityEvent, DataError> {
        self.add_event(event).await
    }

    pub async fn add_milestone(&self, event: &MilestoneEvent) -> Result<MilestoneEvent, DataError> {
        self.add_event(event).await
    }

    pub async fn add_weight(&self, event: &WeightEvent) -> Result<WeightEvent, DataError> {
        self.add_event(event).await
    }

    pub async fn get_sleep(&self, child_id: &str) -> Result<Vec<SleepEvent>, DataError> {
        self.events(child_id).await
    }

    pub async fn get_feeds(&self, child_id: &str) -> Result<Vec<FeedEvent>, DataError> {
        self.events(child_id).await
    }

    pub async fn get_diapers(&self, child_id: &str) -> Result<Vec<DiaperEvent>, DataError> {
        self.events(child_id).await
    }

    pub async fn get_activities(&self, child_id: &str) -> Result<Vec<ActivityEvent>, DataError> {
        self.events(child_id).await
    }

    pub async fn get_milestones(&self, child_id: &str) -> Result<Vec<MilestoneEvent>, DataError> {
        self.events(child_id).await
    }

    pub async fn get_weights(&self, child_id: &str) -> Result<Vec<WeightEvent>, DataError> {
        self.events(child_id).await
    }

    /// Fetch all six datasets for a child concurrently. A failure in any
    /// one fails the joint operation; there is no partial result.
    pub async fn fetch_all_data(&self, child_id: &str) -> Result<AllData, DataError> {
        let (sleep, feeds, diapers, activities, milestones, weights) = tokio::try_join!(
            self.get_sleep(child_id),
            self.get_feeds(child_id),
            self.get_diapers(child_id),
            self.get_activities(child_id),
            self.get_milestones(child_id),
            self.get_weights(child_id),
        )?;
        Ok(AllData {
            sleep,
            feeds,
            diapers,
            activities,
            milestones,
            weights,
        })
    }

    /// Create a new child record owned by the current user.
    pub async fn create_child(
        &self,
        first_name: &str,
        last_name: &str,
        birthdate: NaiveDate,
        sex: Sex,
    ) -> Result<Child, DataError> {
        let user = self.require_user()?;
        if first_name.trim().is_empty() {
            return Err(DataError::Validation(
                "child first name cannot be empty".to_string(),
            ));
        }

        let mut fields = Map::new();
        fields.insert("first_name".to_string(), json!(first_name.trim()));
        fields.insert("last_name".to_string(), json!(last_name.trim()));
        fields.insert("birthdate".to_string(), json!(birthdate.to_string()));
        fields.insert(
            "sex".to_string(),
            serde_json::to_value(sex).map_err(|err| DataError::RemoteWrite(err.into()))?,
        );
        fields.insert("owner_email".to_string(), json!(user.email));
        fields.insert("delegate_emails".to_string(), json!([]));

        let document = self
            .documents
            .add_document(CHILDREN_COLLECTION, fields)
            .await
            .map_err(DataError::RemoteWrite)?;
        info!("Created child {} ({} {})", document.id, first_name, last_name);

        child_from_document(&document, Relationship::Owner).map_err(DataError::RemoteWrite)
    }

    /// All children accessible to the current user, tagged with the
    /// matching relationship. Returns an empty list (not an error) when no
    /// user is signed in.
    pub async fn fetch_children(&self) -> Result<Vec<Child>, DataError> {
        let Some(user) = self.auth.current_user() else {
            debug!("No authenticated user; returning empty child list");
            return Ok(Vec::new());
        };

        let owned = self
            .documents
            .query_documents(
                CHILDREN_COLLECTION,
                &[WhereClause::Eq {
                    field: "owner_email".to_string(),
                    value: json!(user.email),
                }],
            )
            .await
            .map_err(DataError::RemoteRead)?;
        self.metrics.record_remote_query();

        let delegated = self
            .documents
            .query_documents(
                CHILDREN_COLLECTION,
                &[WhereClause::ArrayContains {
                    field: "delegate_emails".to_string(),
                    value: json!(user.email),
                }],
            )
            .await
            .map_err(DataError::RemoteRead)?;
        self.metrics.record_remote_query();

        let mut children = Vec::new();
        for document in &owned {
            match child_from_document(document, Relationship::Owner) {
                Ok(child) => children.push(child),
                Err(err) => warn!("Skipping undecodable child {}: {}", document.id, err),
            }
        }
        for document in &delegated {
            if children.iter().any(|child| child.id == document.id) {
                continue;
            }
            match child_from_document(document, Relationship::Delegate) {
                Ok(child) => children.push(child),
                Err(err) => warn!("Skipping undecodable child {}: {}", document.id, err),
            }
        }

        info!("Found {} accessible children", children.len());
        Ok(children)
    }

    /// Owners delete the child document outright; delegates only remove
    /// their own email from the delegate list.
    pub async fn remove_child_or_access(&self, child: &Child) -> Result<(), DataError> {
        let user = self.require_user()?;

        match child.relationship {
            Relationship::Owner => {
                self.documents
                    .delete_document(&child_path(&child.id))
                    .await
                    .map_err(DataError::RemoteWrite)?;
                info!("Deleted child {}", child.id);
            }
            Relationship::Delegate => {
                self.documents
                    .update_document(
                        &child_path(&child.id),
                        &[FieldMutation::ArrayRemove {
                            field: "delegate_emails".to_string(),
                            value: json!(user.email),
                        }],
                    )
                    .await
                    .map_err(DataError::RemoteWrite)?;
                info!("Removed delegate access to {} for {}", child.id, user.email);
            }
        }

        self.cache.invalidate(&child.id).await;
        Ok(())
    }

    /// Grant another caregiver access to a child.
    pub async fn add_delegate(&self, child: &Child, email: &str) -> Result<(), DataError> {
        self.require_user()?;
        if email.trim().is_empty() {
            return Err(DataError::Validation(
                "delegate email cannot be empty".to_string(),
            ));
        }

        self.documents
            .update_document(
                &child_path(&child.id),
                &[FieldMutation::ArrayUnion {
                    field: "delegate_emails".to_string(),
                    value: json!(email.trim()),
                }],
            )
            .await
            .map_err(DataError::RemoteWrite)?;
        info!("Added delegate {} to {}", email, child.id);
        Ok(())
    }
}

/// Serialize an event for the remote store, converting its temporal fields
/// from RFC 3339 strings to the store's native epoch millis.
fn to_store_fields<T: EventRecord>(event: &T) -> Result<Map<String, Value>, DataError> {
    let value = serde_json::to_value(event).map_err(|err| DataError::RemoteWrite(err.into()))?;
    let Value::Object(mut fields) = value else {
        return Err(DataError::RemoteWrite(anyhow!(
            "event did not serialize to an object"
        )));
    };

    for field in T::TIME_FIELDS {
        let Some(raw) = fields.get(*field) else {
            continue;
        };
        let text = raw.as_str().ok_or_else(|| {
            DataError::RemoteWrite(anyhow!("temporal field {} is not a string", field))
        })?;
        let instant = DateTime::parse_from_rfc3339(text)
            .map_err(|err| DataError::RemoteWrite(anyhow!("bad timestamp in {}: {}", field, err)))?;
        fields.insert(field.to_string(), json!(instant.timestamp_millis()));
    }
    Ok(fields)
}

/// Deserialize an event from a remote document, converting native
/// epoch-millis timestamps back into chrono values.
fn from_store_document<T: EventRecord>(document: &Document) -> anyhow::Result<T> {
    let mut fields = document.fields.clone();
    for field in T::TIME_FIELDS {
        let Some(raw) = fields.get(*field) else {
            continue;
        };
        let millis = raw
            .as_i64()
            .ok_or_else(|| anyhow!("temporal field {} is not a timestamp", field))?;
        let instant = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow!("timestamp out of range in {}", field))?;
        fields.insert(field.to_string(), json!(instant.to_rfc3339()));
    }
    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn child_from_document(document: &Document, relationship: Relationship) -> anyhow::Result<Child> {
    let text_field = |name: &str| -> anyhow::Result<String> {
        document
            .fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("child document missing field {}", name))
    };

    let birthdate: NaiveDate = text_field("birthdate")?
        .parse()
        .map_err(|err| anyhow!("bad birthdate: {}", err))?;
    let sex: Sex = serde_json::from_value(
        document
            .fields
            .get("sex")
            .cloned()
            .ok_or_else(|| anyhow!("child document missing field sex"))?,
    )?;

    Ok(Child {
        id: document.id.clone(),
        first_name: text_field("first_name")?,
        last_name: text_field("last_name")?,
        relationship,
        birthdate,
        sex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::domain::models::events::{ActivityKind, DiaperContents, FeedMethod, NursingSide};
    use crate::storage::memory::{MemoryDocumentStore, MemoryKeyValueStore, StaticAuthProvider};

    struct Fixture {
        documents: Arc<MemoryDocumentStore>,
        auth: Arc<StaticAuthProvider>,
        service: EventService,
    }

    fn setup() -> Fixture {
        let documents = Arc::new(MemoryDocumentStore::new());
        let key_values = Arc::new(MemoryKeyValueStore::new());
        let auth = Arc::new(StaticAuthProvider::signed_in("amy@example.com"));
        let service = EventService::new(documents.clone(), key_values, auth.clone());
        Fixture {
            documents,
            auth,
            service,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn weight(child_id: &str) -> WeightEvent {
        WeightEvent::new(child_id, at(9), 8, 3).unwrap()
    }

    async fn create_child(fixture: &Fixture) -> Child {
        fixture
            .service
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
    async fn test_add_and_get_round_trip() {
        let fixture = setup();
        let stored = fixture.service.add_weight(&weight("c1")).await.unwrap();
        assert_eq!(stored, weight("c1"));

        let weights = fixture.service.get_weights("c1").await.unwrap();
        assert_eq!(weights, vec![weight("c1")]);
    }

    #[tokio::test]
    async fn test_second_read_within_window_is_cached() {
        let fixture = setup();
        fixture.service.add_weight(&weight("c1")).await.unwrap();

        let first = fixture.service.get_weights("c1").await.unwrap();
        let second = fixture.service.get_weights("c1").await.unwrap();
        assert_eq!(first, second);

        // Exactly one remote query despite two reads
        let collection = subcollection("c1", EventKind::Weight);
        assert_eq!(fixture.documents.query_count(&collection).await, 1);
        assert_eq!(fixture.service.metrics().remote_queries(), 1);
    }

    #[tokio::test]
    async fn test_write_invalidates_every_kind() {
        let fixture = setup();
        fixture.service.add_weight(&weight("c1")).await.unwrap();

        // Prime the cache for two kinds
        fixture.service.get_weights("c1").await.unwrap();
        fixture.service.get_sleep("c1").await.unwrap();

        // A sleep write must force the next weight read back to the store
        let session = SleepEvent::new("c1", at(20), at(22), 4).unwrap();
        fixture.service.add_sleep(&session).await.unwrap();
        fixture.service.get_weights("c1").await.unwrap();

        let collection = subcollection("c1", EventKind::Weight);
        assert_eq!(fixture.documents.query_count(&collection).await, 2);
    }

    #[tokio::test]
    async fn test_cache_is_per_child() {
        let fixture = setup();
        fixture.service.add_weight(&weight("c1")).await.unwrap();
        fixture.service.add_weight(&weight("c2")).await.unwrap();

        fixture.service.get_weights("c1").await.unwrap();
        fixture.service.get_weights("c2").await.unwrap();
        fixture.service.get_weights("c1").await.unwrap();

        assert_eq!(
            fixture
                .documents
                .query_count(&subcollection("c1", EventKind::Weight))
                .await,
            1
        );
        assert_eq!(
            fixture
                .documents
                .query_count(&subcollection("c2", EventKind::Weight))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn test_operations_require_authentication() {
        let fixture = setup();
        fixture.auth.sign_out();

        let add = fixture.service.add_weight(&weight("c1")).await;
        assert!(matches!(add, Err(DataError::Unauthenticated)));

        let get = fixture.service.get_weights("c1").await;
        assert!(matches!(get, Err(DataError::Unauthenticated)));

        // fetch_children is the one silent case
        let children = fixture.service.fetch_children().await.unwrap();
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn test_timestamps_cross_boundary_as_millis() {
        let fixture = setup();
        let session = SleepEvent::new("c1", at(20), at(22), 4).unwrap();
        fixture.service.add_sleep(&session).await.unwrap();

        let documents = fixture
            .documents
            .query_documents(&subcollection("c1", EventKind::Sleep), &[])
            .await
            .unwrap();
        assert_eq!(
            documents[0].fields["start"],
            json!(session.start.timestamp_millis())
        );

        let fetched = fixture.service.get_sleep("c1").await.unwrap();
        assert_eq!(fetched, vec![session]);
    }

    #[tokio::test]
    async fn test_fetch_all_data_joint() {
        let fixture = setup();
        fixture.service.add_weight(&weight("c1")).await.unwrap();
        let feed = FeedEvent::new(
            "c1",
            at(8),
            FeedMethod::Nursing {
                side: NursingSide::Left,
            },
            15.0,
            Some("fussy".to_string()),
        )
        .unwrap();
        fixture.service.add_feed(&feed).await.unwrap();
        let diaper = DiaperEvent::new("c1", at(10), DiaperContents::Dry, false);
        fixture.service.add_diaper(&diaper).await.unwrap();
        let activity = ActivityEvent::new("c1", at(11), ActivityKind::TummyTime);
        fixture.service.add_activity(&activity).await.unwrap();

        let all = fixture.service.fetch_all_data("c1").await.unwrap();
        assert_eq!(all.weights, vec![weight("c1")]);
        assert_eq!(all.feeds, vec![feed]);
        assert_eq!(all.diapers, vec![diaper]);
        assert_eq!(all.activities, vec![activity]);
        assert!(all.sleep.is_empty());
        assert!(all.milestones.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_children_union_and_tagging() {
        let fixture = setup();
        let owned = create_child(&fixture).await;

        // A child owned by someone else who delegated to us
        let mut fields = Map::new();
        fields.insert("first_name".to_string(), json!("Theo"));
        fields.insert("last_name".to_string(), json!("Park"));
        fields.insert("birthdate".to_string(), json!("2025-11-02"));
        fields.insert("sex".to_string(), json!("Male"));
        fields.insert("owner_email".to_string(), json!("dana@example.com"));
        fields.insert(
            "delegate_emails".to_string(),
            json!(["amy@example.com"]),
        );
        fixture
            .documents
            .add_document(CHILDREN_COLLECTION, fields)
            .await
            .unwrap();

        let children = fixture.service.fetch_children().await.unwrap();
        assert_eq!(children.len(), 2);
        let maya = children.iter().find(|child| child.id == owned.id).unwrap();
        assert_eq!(maya.relationship, Relationship::Owner);
        let theo = children
            .iter()
            .find(|child| child.first_name == "Theo")
            .unwrap();
        assert_eq!(theo.relationship, Relationship::Delegate);
    }

    #[tokio::test]
    async fn test_delegate_removal_keeps_document() {
        let fixture = setup();
        let child = create_child(&fixture).await;
        fixture
            .service
            .add_delegate(&child, "ben@example.com")
            .await
            .unwrap();

        // Ben removes his own access
        fixture.auth.sign_in("ben@example.com");
        let as_delegate = Child {
            relationship: Relationship::Delegate,
            ..child.clone()
        };
        fixture
            .service
            .remove_child_or_access(&as_delegate)
            .await
            .unwrap();

        // The owner can still fetch the child afterwards
        fixture.auth.sign_in("amy@example.com");
        let children = fixture.service.fetch_children().await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);

        // Ben no longer sees it
        fixture.auth.sign_in("ben@example.com");
        assert!(fixture.service.fetch_children().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owner_removal_deletes_document() {
        let fixture = setup();
        let child = create_child(&fixture).await;

        fixture.service.remove_child_or_access(&child).await.unwrap();
        assert!(fixture.service.fetch_children().await.unwrap().is_empty());
        assert_eq!(
            fixture
                .documents
                .get_document(&child_path(&child.id))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_metrics_reset_on_child_switch() {
        let fixture = setup();
        fixture.service.add_weight(&weight("c1")).await.unwrap();
        fixture.service.get_weights("c1").await.unwrap();
        assert!(fixture.service.metrics().remote_queries() > 0);

        fixture.service.reset_metrics();
        assert_eq!(fixture.service.metrics().remote_queries(), 0);
    }

    #[tokio::test]
    async fn test_create_child_validation() {
        let fixture = setup();
        let result = fixture
            .service
            .create_child(
                "  ",
                "Quinn",
                NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
                Sex::Female,
            )
            .await;
        assert!(matches!(result, Err(DataError::Validation(_))));
    }
}
