//! Load-decide-append loop shared by the domain services.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};
use serde::{Serialize, de::DeserializeOwned};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Outcome of a command that was accepted.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate with the new events applied.
    pub aggregate: A,
    pub events: Vec<A::Event>,
    pub new_version: Version,
}

/// Loads aggregates from an [`EventStore`] and persists the events their
/// commands produce.
///
/// Every append carries the version the command was decided against, so two
/// writers racing on one aggregate cannot both succeed: the second gets
/// [`event_store::EventStoreError::ConcurrencyConflict`].
pub struct CommandHandler<S, A> {
    store: S,
    _aggregate: PhantomData<fn() -> A>,
}

impl<S: Clone, A> Clone for CommandHandler<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate + DeserializeOwned,
    A::Event: Serialize + DeserializeOwned,
    DomainError: From<A::Error>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _aggregate: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds the aggregate from its latest snapshot plus newer events.
    ///
    /// An aggregate with no events comes back as `A::default()`.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => {
                let mut restored: A = snapshot.restore()?;
                restored.set_version(snapshot.version);
                restored
            }
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Like [`load`](Self::load) but returns `None` for an aggregate that was
    /// never created.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Runs `decide` against the current state and appends what it returns.
    ///
    /// An empty event list is accepted and persists nothing.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = decide(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = build_envelopes::<A>(aggregate_id, current_version, &events)?;
        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };
        let new_version = self.store.append(envelopes, options).await?;

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
    A::Event: Serialize + DeserializeOwned,
    DomainError: From<A::Error>,
{
    /// [`execute`](Self::execute), then stores a snapshot when the new
    /// version lands on the aggregate's snapshot interval.
    ///
    /// A failed snapshot write is logged and does not fail the command; the
    /// events are already durable.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let result = self.execute(aggregate_id, decide).await?;

        if !result.events.is_empty() && result.aggregate.should_snapshot() {
            let snapshot = Snapshot::capture(
                aggregate_id,
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            )?;
            if let Err(e) = self.store.save_snapshot(snapshot).await {
                tracing::warn!(%aggregate_id, error = %e, "failed to save snapshot");
            }
        }

        Ok(result)
    }
}

fn build_envelopes<A>(
    aggregate_id: AggregateId,
    current_version: Version,
    events: &[A::Event],
) -> Result<Vec<EventEnvelope>, DomainError>
where
    A: Aggregate,
    A::Event: Serialize,
{
    let mut version = current_version;
    events
        .iter()
        .map(|event| {
            version = version.next();
            Ok(EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::InMemoryEventStore;
    use serde::Deserialize;

    use crate::order::OrderError;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: AggregateId },
        Bumped { by: u32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Bumped { .. } => "CounterBumped",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        value: u32,
        #[serde(skip)]
        version: Version,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = OrderError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id } => self.id = Some(id),
                CounterEvent::Bumped { by } => self.value += by,
            }
        }
    }

    impl SnapshotCapable for Counter {
        fn snapshot_interval() -> usize {
            3
        }
    }

    fn handler(store: InMemoryEventStore) -> CommandHandler<InMemoryEventStore, Counter> {
        CommandHandler::new(store)
    }

    #[tokio::test]
    async fn first_command_creates_the_stream() {
        let handler = handler(InMemoryEventStore::new());
        let id = AggregateId::new();

        let result = handler
            .execute(id, |_| Ok(vec![CounterEvent::Opened { id }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.id(), Some(id));
        assert!(handler.load_existing(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rejected_command_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler = handler(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Err(OrderError::EmptyOrder))
            .await;

        assert!(matches!(result, Err(DomainError::Order(OrderError::EmptyOrder))));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn empty_decision_is_a_no_op() {
        let store = InMemoryEventStore::new();
        let handler = handler(store.clone());

        let result = handler.execute(AggregateId::new(), |_| Ok(vec![])).await.unwrap();

        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
        assert!(handler.load_existing(AggregateId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_is_written_on_interval_and_used_on_load() {
        let store = InMemoryEventStore::new();
        let handler = handler(store.clone());
        let id = AggregateId::new();

        handler
            .execute_with_snapshot(id, |_| Ok(vec![CounterEvent::Opened { id }]))
            .await
            .unwrap();
        for _ in 0..3 {
            handler
                .execute_with_snapshot(id, |_| Ok(vec![CounterEvent::Bumped { by: 2 }]))
                .await
                .unwrap();
        }

        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(3));

        let counter = handler.load(id).await.unwrap();
        assert_eq!(counter.value, 6);
        assert_eq!(counter.version(), Version::new(4));
    }
}
