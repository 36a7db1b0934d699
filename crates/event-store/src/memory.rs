use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{AppendOptions, EventStore, EventStream, validate_batch};
use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version};

#[derive(Default)]
struct Inner {
    streams: HashMap<AggregateId, Vec<EventEnvelope>>,
    /// Global write order as `(aggregate, index into its stream)`.
    log: Vec<(AggregateId, usize)>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

/// In-memory event store.
///
/// Used by tests and by the API when no `DATABASE_URL` is configured.
/// Clones share the same underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events across all streams.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }

    /// Number of events of the given aggregate type.
    pub async fn count_by_aggregate_type(&self, aggregate_type: &str) -> usize {
        self.inner
            .read()
            .await
            .streams
            .values()
            .flatten()
            .filter(|e| e.aggregate_type == aggregate_type)
            .count()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let (aggregate_id, first_version) = validate_batch(&events)?;

        let mut inner = self.inner.write().await;
        let current = inner
            .streams
            .get(&aggregate_id)
            .and_then(|s| s.last())
            .map(|e| e.version)
            .unwrap_or_default();

        if let Some(expected) = options.expected_version
            && expected != current
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Mirrors the unique (aggregate_id, version) constraint of the SQL schema.
        if first_version != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: first_version,
                actual: current,
            });
        }

        let Inner { streams, log, .. } = &mut *inner;
        let stream = streams.entry(aggregate_id).or_default();
        for event in events {
            log.push((aggregate_id, stream.len()));
            stream.push(event);
        }

        Ok(stream.last().map(|e| e.version).unwrap_or(current))
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        Ok(self
            .inner
            .read()
            .await
            .streams
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(&aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        let inner = self.inner.read().await;
        let events: Vec<EventEnvelope> = inner
            .log
            .iter()
            .filter_map(|(id, index)| inner.streams.get(id).and_then(|s| s.get(*index)))
            .cloned()
            .collect();

        Ok(Box::pin(futures_util::stream::iter(
            events.into_iter().map(Ok),
        )))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self
            .inner
            .read()
            .await
            .streams
            .get(&aggregate_id)
            .and_then(|s| s.last())
            .map(|e| e.version))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.inner
            .write()
            .await
            .snapshots
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.inner.read().await.snapshots.get(&aggregate_id).cloned())
    }
}
