use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::storage::traits::{Document, DocumentStore, FieldMutation, WhereClause};

/// In-memory document store.
///
/// Documents live in collections keyed by path (`children`,
/// `children/{id}/sleep`). Queries are counted per collection so tests can
/// verify that cache-fresh reads issue no remote query.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    query_counts: RwLock<HashMap<String, u64>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many queries have been issued against `collection`.
    pub async fn query_count(&self, collection: &str) -> u64 {
        self.query_counts
            .read()
            .await
            .get(collection)
            .copied()
            .unwrap_or(0)
    }

    /// Total queries issued across all collections.
    pub async fn total_query_count(&self) -> u64 {
        self.query_counts.read().await.values().sum()
    }

    fn split_path(path: &str) -> Result<(&str, &str)> {
        path.rsplit_once('/')
            .ok_or_else(|| anyhow!("invalid document path: {}", path))
    }

    fn matches(document: &Document, clauses: &[WhereClause]) -> bool {
        clauses.iter().all(|clause| match clause {
            WhereClause::Eq { field, value } => document.fields.get(field) == Some(value),
            WhereClause::ArrayContains { field, value } => document
                .fields
                .get(field)
                .and_then(Value::as_array)
                .map(|items| items.contains(value))
                .unwrap_or(false),
        })
    }

    fn apply_mutation(document: &mut Document, mutation: &FieldMutation) {
        match mutation {
            FieldMutation::ArrayUnion { field, value } => {
                let entry = document
                    .fields
                    .entry(field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
            FieldMutation::ArrayRemove { field, value } => {
                if let Some(Value::Array(items)) = document.fields.get_mut(field) {
                    items.retain(|item| item != value);
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query_documents(
        &self,
        collection: &str,
        clauses: &[WhereClause],
    ) -> Result<Vec<Document>> {
        *self
            .query_counts
            .write()
            .await
            .entry(collection.to_string())
            .or_insert(0) += 1;

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| Self::matches(document, clauses))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_document(&self, collection: &str, fields: Map<String, Value>) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            fields,
        };
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn update_document(&self, path: &str, mutations: &[FieldMutation]) -> Result<()> {
        let (collection, id) = Self::split_path(path)?;
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|document| document.id == id))
            .ok_or_else(|| anyhow!("document not found: {}", path))?;

        for mutation in mutations {
            Self::apply_mutation(document, mutation);
        }
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> Result<()> {
        let (collection, id) = Self::split_path(path)?;
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            documents.retain(|document| document.id != id);
        }
        Ok(())
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>> {
        let (collection, id) = Self::split_path(path)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| document.id == id))
            .cloned())
    }
}
