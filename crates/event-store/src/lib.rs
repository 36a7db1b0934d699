//! Event store for the checkout services.
//!
//! Every aggregate (cart, order, checkout saga) is persisted as an ordered
//! stream of events with optimistic concurrency on append. Two backends share
//! the [`EventStore`] trait: [`InMemoryEventStore`] and [`PostgresEventStore`].

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
