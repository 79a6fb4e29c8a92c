//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate its tables
//! between cases, so they are marked `#[serial]`. Docker must be available:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration
//! ```

use std::sync::Arc;

use common::{Actor, UserId};
use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventQuery, EventStore, EventStoreError,
    EventStoreExt, PostgresEventStore, Snapshot, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            for migration in [
                include_str!("../../../migrations/001_create_events_table.sql"),
                include_str!("../../../migrations/002_create_sequences_table.sql"),
            ] {
                sqlx::raw_sql(migration).execute(&temp_pool).await.unwrap();
            }
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events, snapshots, sequences")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn order_event(aggregate_id: AggregateId, version: i64, event_type: &str) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Order")
        .event_type(event_type)
        .version(Version::new(version))
        .payload_raw(serde_json::json!({"order_number": "SP260119001"}))
        .build()
        .unwrap()
}

#[tokio::test]
#[serial]
async fn append_and_retrieve_events() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    let version = store
        .append(
            vec![
                order_event(id, 1, "OrderPlaced"),
                order_event(id, 2, "OrderStatusChanged"),
            ],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    assert_eq!(version, Version::new(2));

    let events = store.get_events_for_aggregate(id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "OrderPlaced");
    assert_eq!(events[1].version, Version::new(2));
    assert_eq!(store.get_aggregate_version(id).await.unwrap(), Some(version));
}

#[tokio::test]
#[serial]
async fn stale_expected_version_is_rejected() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store
        .append(vec![order_event(id, 1, "OrderPlaced")], AppendOptions::expect_new())
        .await
        .unwrap();

    let result = store
        .append(
            vec![order_event(id, 2, "OrderStatusChanged")],
            AppendOptions::expect_version(Version::initial()),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { actual, .. }) if actual == Version::first()
    ));
    assert_eq!(store.get_events_for_aggregate(id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn duplicate_version_maps_to_conflict() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store
        .append(vec![order_event(id, 1, "OrderPlaced")], AppendOptions::new())
        .await
        .unwrap();

    let err = store
        .append(vec![order_event(id, 1, "OrderPlaced")], AppendOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
#[serial]
async fn query_filters_by_type_and_limit() {
    let store = get_test_store().await;
    for _ in 0..3 {
        let id = AggregateId::new();
        store
            .append(
                vec![
                    order_event(id, 1, "OrderPlaced"),
                    order_event(id, 2, "OrderStatusChanged"),
                ],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
    }

    let placed = store
        .query_events(EventQuery::for_aggregate_type("Order").event_type("OrderPlaced"))
        .await
        .unwrap();
    assert_eq!(placed.len(), 3);
    assert!(placed.iter().all(|e| e.event_type == "OrderPlaced"));

    let limited = store.query_events(EventQuery::new().limit(4)).await.unwrap();
    assert_eq!(limited.len(), 4);
}

#[tokio::test]
#[serial]
async fn snapshot_replaces_previous_and_shortens_load() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    let events = (1..=4).map(|v| order_event(id, v, "OrderStatusChanged")).collect();
    store.append(events, AppendOptions::expect_new()).await.unwrap();

    for (version, label) in [(1, "first"), (3, "second")] {
        let snapshot = Snapshot::from_state(
            id,
            "Order",
            Version::new(version),
            &serde_json::json!({"state": label}),
        )
        .unwrap();
        store.save_snapshot(snapshot).await.unwrap();
    }

    let (snapshot, tail) = store.load_aggregate(id).await.unwrap();
    let snapshot = snapshot.unwrap();
    assert_eq!(snapshot.version, Version::new(3));
    assert_eq!(snapshot.state, serde_json::json!({"state": "second"}));
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].version, Version::new(4));
}

#[tokio::test]
#[serial]
async fn stream_all_events_in_insertion_order() {
    use futures_util::StreamExt;

    let store = get_test_store().await;
    let first = AggregateId::new();
    let second = AggregateId::new();
    store
        .append(vec![order_event(first, 1, "OrderPlaced")], AppendOptions::new())
        .await
        .unwrap();
    store
        .append(vec![order_event(second, 1, "OrderPlaced")], AppendOptions::new())
        .await
        .unwrap();

    let events: Vec<_> = store.stream_all_events().await.unwrap().collect().await;
    let ids: Vec<_> = events.into_iter().map(|e| e.unwrap().aggregate_id).collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
#[serial]
async fn actor_metadata_round_trips() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    let actor = Actor::driver(UserId::new());

    let event = EventEnvelope::builder()
        .aggregate_id(id)
        .aggregate_type("Delivery")
        .event_type("LocationUpdated")
        .version(Version::first())
        .payload_raw(serde_json::json!({"lat": 38.72, "lng": -9.14}))
        .actor(actor)
        .unwrap()
        .build()
        .unwrap();
    store.append(vec![event], AppendOptions::expect_new()).await.unwrap();

    let stored = store.get_events_for_aggregate(id).await.unwrap();
    assert_eq!(stored[0].actor(), Some(actor));
}

#[tokio::test]
#[serial]
async fn concurrent_sequence_values_are_unique() {
    let store = get_test_store().await;

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.next_sequence("order-number:260119").await.unwrap() })
        })
        .collect();

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap());
    }
    values.sort_unstable();
    assert_eq!(values, (1..=25).collect::<Vec<_>>());

    assert_eq!(store.next_sequence("order-number:260120").await.unwrap(), 1);
}
