//! Projection error types.

use thiserror::Error;

/// Errors that can occur while projecting events.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// An event payload did not decode into the expected event type.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Projection error: {0}")]
    Projection(String),

    /// A projection failed while handling a delivered event.
    #[error("Projection {projection} failed: {message}")]
    Handler {
        projection: &'static str,
        message: String,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
