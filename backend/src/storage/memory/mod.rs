//! # In-Memory Storage Module
//!
//! In-memory implementations of the storage capability traits. These back
//! the test suite and local development, and demonstrate that the domain
//! layer is completely storage-agnostic.
//!
//! The document store additionally counts queries per collection so tests
//! can assert cache behavior (a fresh cache must serve reads without a
//! remote query).

pub mod auth;
pub mod document_store;
pub mod key_value_store;

pub use auth::StaticAuthProvider;
pub use document_store::MemoryDocumentStore;
pub use key_value_store::MemoryKeyValueStore;
