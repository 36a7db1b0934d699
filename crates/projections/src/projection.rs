//! The projection contract and log offsets.

use async_trait::async_trait;
use event_store::{EventEnvelope, EventId};

use crate::Result;

/// How far into the global log a projection has read.
///
/// `offset` counts consumed events, so offset `n` means the first `n` events
/// of the log have been handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub offset: u64,
    pub last_event_id: Option<EventId>,
}

impl ProjectionPosition {
    pub fn start() -> Self {
        Self::default()
    }

    /// The position just past `event`.
    pub fn after(&self, event: &EventEnvelope) -> Self {
        Self {
            offset: self.offset + 1,
            last_event_id: Some(event.event_id),
        }
    }

    /// Whether the event at 1-based log offset `offset` was already consumed.
    pub fn has_consumed(&self, offset: u64) -> bool {
        self.offset >= offset
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_event_id {
            Some(id) => write!(f, "offset {} (last {id})", self.offset),
            None => write!(f, "offset {}", self.offset),
        }
    }
}

/// Turns the global event log into a read model.
///
/// A projection is handed every event in log order, including events of
/// aggregates it ignores; those still move its position forward.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state so the log can be replayed from the start.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::Version;

    fn event() -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Order")
            .event_type("OrderPlaced")
            .version(Version::new(1))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn after_moves_one_event_forward() {
        let first = event();
        let second = event();

        let pos = ProjectionPosition::start().after(&first).after(&second);

        assert_eq!(pos.offset, 2);
        assert_eq!(pos.last_event_id, Some(second.event_id));
        assert!(pos.has_consumed(2));
        assert!(!pos.has_consumed(3));
    }

    #[test]
    fn display_names_the_last_event() {
        assert_eq!(ProjectionPosition::start().to_string(), "offset 0");

        let event = event();
        let pos = ProjectionPosition::start().after(&event);
        assert_eq!(pos.to_string(), format!("offset 1 (last {})", event.event_id));
    }
}
