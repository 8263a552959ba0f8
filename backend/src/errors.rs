//! Error taxonomy for the data core.
//!
//! Data-access failures propagate to the caller as typed errors; the UI owns
//! the user-facing messaging. Cache IO failures never appear here - the cache
//! coordinator logs them and degrades to a live fetch.

use thiserror::Error;

/// Errors surfaced by the event data access layer and session.
#[derive(Debug, Error)]
pub enum DataError {
    /// The operation requires an authenticated user and none is signed in.
    #[error("no authenticated user")]
    Unauthenticated,

    /// A remote document store read failed. Not retried.
    #[error("remote read failed: {0}")]
    RemoteRead(#[source] anyhow::Error),

    /// A remote document store write failed. Not retried.
    #[error("remote write failed: {0}")]
    RemoteWrite(#[source] anyhow::Error),

    /// A record failed validation before persistence.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Internal failures of the insight generation call.
///
/// These never reach the UI as structured errors - the insight service
/// converts them into its fixed fallback message.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("insight request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("insight endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("insight response had no message content")]
    MalformedBody,
}
