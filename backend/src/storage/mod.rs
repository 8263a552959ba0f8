//! Storage abstractions and backends.

pub mod memory;
pub mod traits;

pub use traits::{
    AuthProvider, Document, DocumentStore, FieldMutation, KeyValueStore, TimestampMs, UserAccount,
    WhereClause,
};
