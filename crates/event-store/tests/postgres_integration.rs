//! PostgreSQL integration tests.
//!
//! These need Docker and share one container, so they are ignored by default:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStoreExt,
    PostgresEventStore, Snapshot, Version,
};
use futures_util::StreamExt;
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // kept alive for the whole test binary
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn container() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string = format!("postgres://postgres:postgres@{host}:{port}/postgres");

            PostgresEventStore::connect(&connection_string)
                .await
                .unwrap()
                .run_migrations()
                .await
                .unwrap();

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn fresh_store() -> PostgresEventStore {
    let info = container().await;
    let store = PostgresEventStore::connect(&info.connection_string)
        .await
        .unwrap();
    sqlx::query("TRUNCATE TABLE events, snapshots")
        .execute(store.pool())
        .await
        .unwrap();
    store
}

fn cart_event(aggregate_id: AggregateId, version: i64, event_type: &str) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Cart")
        .event_type(event_type)
        .version(Version::new(version))
        .payload_raw(serde_json::json!({"version": version}))
        .metadata("correlation_id", serde_json::json!("test"))
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn append_batch_and_read_back() {
    let store = fresh_store().await;
    let cart = AggregateId::new();

    let version = store
        .append(
            vec![
                cart_event(cart, 1, "CartCreated"),
                cart_event(cart, 2, "ItemAdded"),
                cart_event(cart, 3, "ItemAdded"),
            ],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    assert_eq!(version, Version::new(3));

    let events = store.get_events_for_aggregate(cart).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].event_type, "CartCreated");
    assert_eq!(
        events[2].metadata.get("correlation_id"),
        Some(&serde_json::json!("test"))
    );

    let tail = store
        .get_events_for_aggregate_from_version(cart, Version::new(2))
        .await
        .unwrap();
    assert_eq!(tail.len(), 2);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn stale_writer_gets_conflict() {
    let store = fresh_store().await;
    let cart = AggregateId::new();
    store
        .append(vec![cart_event(cart, 1, "CartCreated")], AppendOptions::expect_new())
        .await
        .unwrap();

    store
        .append(
            vec![cart_event(cart, 2, "CheckoutStarted")],
            AppendOptions::expect_version(Version::new(1)),
        )
        .await
        .unwrap();

    let err = store
        .append(
            vec![cart_event(cart, 2, "CheckoutStarted")],
            AppendOptions::expect_version(Version::new(1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EventStoreError::ConcurrencyConflict { actual, .. } if actual == Version::new(2)
    ));
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn unique_version_constraint_maps_to_conflict() {
    let store = fresh_store().await;
    let order = AggregateId::new();
    store
        .append(vec![cart_event(order, 1, "OrderPlaced")], AppendOptions::new())
        .await
        .unwrap();

    let err = store
        .append(vec![cart_event(order, 1, "OrderPlaced")], AppendOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn concurrent_claims_admit_one_writer() {
    let store = fresh_store().await;
    let cart = AggregateId::new();
    store
        .append(vec![cart_event(cart, 1, "CartCreated")], AppendOptions::expect_new())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append(
                    vec![cart_event(cart, 2, "CheckoutStarted")],
                    AppendOptions::expect_version(Version::new(1)),
                )
                .await
        }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(
        store.get_aggregate_version(cart).await.unwrap(),
        Some(Version::new(2))
    );
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn snapshots_replace_and_load() {
    let store = fresh_store().await;
    let cart = AggregateId::new();
    store
        .append(
            vec![
                cart_event(cart, 1, "CartCreated"),
                cart_event(cart, 2, "ItemAdded"),
                cart_event(cart, 3, "ItemAdded"),
            ],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    assert!(store.get_snapshot(cart).await.unwrap().is_none());

    for (version, label) in [(1, "first"), (2, "second")] {
        let snapshot =
            Snapshot::capture(cart, "Cart", Version::new(version), &serde_json::json!({ "s": label }))
                .unwrap();
        store.save_snapshot(snapshot).await.unwrap();
    }

    let (snapshot, events) = store.load_aggregate(cart).await.unwrap();
    let snapshot = snapshot.unwrap();
    assert_eq!(snapshot.version, Version::new(2));
    assert_eq!(snapshot.state, serde_json::json!({"s": "second"}));
    assert_eq!(events.len(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn stream_all_follows_write_order() {
    let store = fresh_store().await;
    let a = AggregateId::new();
    let b = AggregateId::new();

    store.append(vec![cart_event(a, 1, "A1")], AppendOptions::new()).await.unwrap();
    store.append(vec![cart_event(b, 1, "B1")], AppendOptions::new()).await.unwrap();
    store.append(vec![cart_event(a, 2, "A2")], AppendOptions::new()).await.unwrap();

    let types: Vec<String> = store
        .stream_all_events()
        .await
        .unwrap()
        .map(|e| e.unwrap().event_type)
        .collect()
        .await;
    assert_eq!(types, vec!["A1", "B1", "A2"]);
    assert!(store.aggregate_exists(a).await.unwrap());
    assert!(!store.aggregate_exists(AggregateId::new()).await.unwrap());
}
