//! # Storage Traits
//!
//! Capability traits for the external collaborators the data core talks to:
//! the remote document store, the device-local key-value store, and the
//! authentication provider. The domain layer works only against these
//! traits, so different backends (a hosted document database, the in-memory
//! implementation used by tests) are interchangeable.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// The remote store's native temporal type: milliseconds since the Unix
/// epoch. Converted to/from `chrono` types at the data-access boundary.
pub type TimestampMs = i64;

/// A document read from or written to the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned identifier, unique within its collection.
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Full path of this document under `collection`.
    pub fn path(&self, collection: &str) -> String {
        format!("{}/{}", collection, self.id)
    }
}

/// A single predicate of a document query.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// Field equals value.
    Eq { field: String, value: Value },
    /// Array-valued field contains value.
    ArrayContains { field: String, value: Value },
}

/// A field mutation applied by `update_document`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMutation {
    /// Append to an array-valued field if the value is absent.
    ArrayUnion { field: String, value: Value },
    /// Remove all occurrences of the value from an array-valued field.
    ArrayRemove { field: String, value: Value },
}

/// Trait defining the interface to the remote document store.
///
/// Collections are hierarchical paths (`children`, `children/{id}/sleep`);
/// document paths are `{collection}/{document_id}`. Event subcollections are
/// append-only from this core's perspective.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Query a collection, returning documents matching every clause.
    async fn query_documents(
        &self,
        collection: &str,
        clauses: &[WhereClause],
    ) -> Result<Vec<Document>>;

    /// Add a new document with a store-assigned id; returns the stored document.
    async fn add_document(&self, collection: &str, fields: Map<String, Value>) -> Result<Document>;

    /// Apply field mutations to an existing document.
    async fn update_document(&self, path: &str, mutations: &[FieldMutation]) -> Result<()>;

    /// Delete a document. Cascading deletion of subcollections is a
    /// store-level concern.
    async fn delete_document(&self, path: &str) -> Result<()>;

    /// Fetch a single document, or `None` if it does not exist.
    async fn get_document(&self, path: &str) -> Result<Option<Document>>;
}

/// Trait defining the interface to the device-local key-value store.
///
/// Values are JSON-serialized records; date/time fields are serialized as
/// strings and re-hydrated into temporal values on read.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
    async fn multi_remove(&self, keys: &[String]) -> Result<()>;
}

/// The signed-in user as reported by the authentication collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    pub email: String,
}

/// Trait defining the interface to the authentication collaborator.
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in user, or `None` when signed out.
    fn current_user(&self) -> Option<UserAccount>;
}
