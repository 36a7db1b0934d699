//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{CatalogClient, CheckoutSettings, InMemoryCatalog};
use common::AggregateId;
use domain::{CartEvent, Money, ProductId, ProductSnapshot};
use event_store::{EventStore, InMemoryEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    store: InMemoryEventStore,
    catalog: InMemoryCatalog,
}

impl TestApp {
    fn new() -> Self {
        let store = InMemoryEventStore::new();
        let catalog = InMemoryCatalog::new()
            .with_product(
                ProductSnapshot::new("SKU-MUG", "Enamel mug", Money::from_cents(1250)).with_stock(10),
            )
            .with_product(
                ProductSnapshot::new("SKU-LAMP", "Desk lamp", Money::from_cents(4999)).with_stock(2),
            );
        let client = CatalogClient::new(catalog.clone(), Duration::from_secs(1));
        let state = Arc::new(api::AppState::new(
            store.clone(),
            client,
            CheckoutSettings::default(),
        ));
        let app = api::create_app(state, get_metrics_handle());
        Self {
            app,
            store,
            catalog,
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn add(&self, owner: Uuid, product_id: &str, quantity: u32) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/carts/{owner}/items"),
            Some(json!({ "product_id": product_id, "quantity": quantity })),
        )
        .await
    }

    async fn checkout(&self, owner: Uuid) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/owners/{owner}/orders"),
            Some(json!({
                "shipping_address": "12 Harbour Lane",
                "tax_cents": 500,
                "shipping_cost_cents": 700,
                "discount_cents": 200
            })),
        )
        .await
    }

    /// Fills the cart with two mugs and a lamp, checks out and returns the order.
    async fn place_order(&self, owner: Uuid) -> Value {
        assert_eq!(self.add(owner, "SKU-MUG", 2).await.0, StatusCode::OK);
        assert_eq!(self.add(owner, "SKU-LAMP", 1).await.0, StatusCode::OK);
        let (status, order) = self.checkout(owner).await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order
    }

    fn stock(&self, product_id: &str) -> u32 {
        self.catalog.stock(&ProductId::new(product_id)).unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = TestApp::new();

    let (status, json) = t.send("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_cart_lifecycle() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();

    let (status, cart) = t.send("GET", &format!("/carts/{owner}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_items"], 0);

    let (status, cart) = t.add(owner, "SKU-MUG", 2).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_amount_cents"], 2500);
    let item_id = cart["items"][0]["item_id"].as_str().unwrap().to_string();

    // Adding the same product again merges into one line.
    let (_, cart) = t.add(owner, "SKU-MUG", 1).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"], 3);

    let (status, cart) = t
        .send(
            "PUT",
            &format!("/carts/{owner}/items/{item_id}"),
            Some(json!({ "quantity": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_amount_cents"], 6250);

    let (_, count) = t.send("GET", &format!("/carts/{owner}/count"), None).await;
    assert_eq!(count["count"], 5);

    let (status, cart) = t
        .send("DELETE", &format!("/carts/{owner}/items/{item_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_items"], 0);

    t.add(owner, "SKU-LAMP", 1).await;
    let (status, cart) = t.send("DELETE", &format!("/carts/{owner}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_rejections_map_to_statuses() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();

    let (status, body) = t.add(owner, "SKU-NOPE", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());

    assert_eq!(t.add(owner, "SKU-MUG", 0).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(t.add(owner, "SKU-LAMP", 3).await.0, StatusCode::CONFLICT);

    let (status, _) = t.send("GET", "/carts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing_item = Uuid::new_v4();
    let (status, _) = t
        .send("DELETE", &format!("/carts/{owner}/items/{missing_item}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_creates_order_and_reserves_stock() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();

    let order = t.place_order(owner).await;

    assert_eq!(order["owner_id"], owner.to_string());
    assert_eq!(order["subtotal_cents"], 2 * 1250 + 4999);
    assert_eq!(order["final_amount_cents"], 2 * 1250 + 4999 + 500 + 700 - 200);
    assert_eq!(order["total_items"], 3);
    assert_eq!(order["fulfillment_status"], "PENDING");
    assert_eq!(order["payment_status"], "PENDING");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert!(order["estimated_delivery"].is_string());

    assert_eq!(t.stock("SKU-MUG"), 8);
    assert_eq!(t.stock("SKU-LAMP"), 1);

    let (_, cart) = t.send("GET", &format!("/carts/{owner}"), None).await;
    assert_eq!(cart["total_items"], 0);
    assert_eq!(cart["checkout_in_progress"], false);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();

    let (status, _) = t.checkout(owner).await;
    assert_eq!(status, StatusCode::CONFLICT, "empty cart");

    t.add(owner, "SKU-MUG", 1).await;
    let (status, _) = t
        .send(
            "POST",
            &format!("/owners/{owner}/orders"),
            Some(json!({ "shipping_address": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            "POST",
            &format!("/owners/{owner}/orders"),
            Some(json!({ "shipping_address": "1 Main St", "discount_cents": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was reserved and the cart is untouched.
    assert_eq!(t.stock("SKU-MUG"), 10);
    let (_, count) = t.send("GET", &format!("/carts/{owner}/count"), None).await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn test_checkout_with_overflowing_tax_is_rejected() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();
    t.add(owner, "SKU-MUG", 2).await;

    let (status, _) = t
        .send(
            "POST",
            &format!("/owners/{owner}/orders"),
            Some(json!({ "shipping_address": "1 Main St", "tax_cents": i64::MAX })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.catalog.active_reservations(), 0);
    assert_eq!(t.stock("SKU-MUG"), 10);

    // The cart was never claimed, so it still takes changes.
    let (status, cart) = t.add(owner, "SKU-MUG", 1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_items"], 3);
}

#[tokio::test]
async fn test_checkout_of_sold_out_item_is_conflict() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();
    t.add(owner, "SKU-LAMP", 2).await;

    // Another buyer takes the lamps first.
    t.place_order(Uuid::new_v4()).await;

    let (status, _) = t.checkout(owner).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(t.stock("SKU-LAMP"), 1);
}

#[tokio::test]
async fn test_order_lookups_are_owner_scoped() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();
    let order = t.place_order(owner).await;
    let order_id = order["id"].as_str().unwrap();
    let number = order["order_number"].as_str().unwrap();

    let (status, fetched) = t
        .send("GET", &format!("/owners/{owner}/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_number"], number);
    assert_eq!(fetched["items"].as_array().unwrap().len(), 2);

    let (status, by_number) = t
        .send("GET", &format!("/owners/{owner}/orders/number/{number}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_number["id"], order_id);

    let stranger = Uuid::new_v4();
    let (status, _) = t
        .send("GET", &format!("/owners/{stranger}/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t
        .send("GET", &format!("/owners/{stranger}/orders/number/{number}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, list) = t.send("GET", &format!("/owners/{owner}/orders"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], order_id);

    let (_, list) = t
        .send("GET", &format!("/owners/{stranger}/orders"), None)
        .await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_releases_stock() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();
    let order = t.place_order(owner).await;
    let order_id = order["id"].as_str().unwrap();
    let cancel_uri = format!("/owners/{owner}/orders/{order_id}/cancel");

    let (status, cancelled) = t
        .send("POST", &cancel_uri, Some(json!({ "reason": "ordered twice" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["fulfillment_status"], "CANCELLED");
    assert_eq!(cancelled["payment_status"], "REFUNDED");
    assert_eq!(cancelled["cancellation_reason"], "ordered twice");
    let releases = cancelled["stock_releases"].as_array().unwrap();
    assert_eq!(releases.len(), 2);
    assert!(releases.iter().all(|r| r["released"] == true));

    assert_eq!(t.stock("SKU-MUG"), 10);
    assert_eq!(t.stock("SKU-LAMP"), 2);

    let (status, _) = t.send("POST", &cancel_uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_lookup_ignores_ownership() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();
    let order = t.place_order(owner).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, fetched) = t
        .send("GET", &format!("/admin/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["owner_id"], owner.to_string());
    assert_eq!(fetched["order_number"], order["order_number"]);

    let unknown = Uuid::new_v4();
    let (status, _) = t
        .send("GET", &format!("/admin/orders/{unknown}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("GET", "/admin/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_status_updates() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();
    let order = t.place_order(owner).await;
    let order_id = order["id"].as_str().unwrap();
    let uri = format!("/admin/orders/{order_id}/status");

    let (status, updated) = t
        .send(
            "PATCH",
            &uri,
            Some(json!({
                "fulfillment": "CONFIRMED",
                "payment": "COMPLETED",
                "transaction_id": "txn-8841"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["fulfillment_status"], "CONFIRMED");
    assert_eq!(updated["payment_status"], "COMPLETED");
    assert_eq!(updated["transaction_id"], "txn-8841");

    let (status, _) = t
        .send("PATCH", &uri, Some(json!({ "fulfillment": "DELIVERED" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "skipping shipment");

    let (status, _) = t
        .send("PATCH", &uri, Some(json!({ "fulfillment": "CANCELLED" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "cancellation has its own route");

    let unknown = Uuid::new_v4();
    let (status, _) = t
        .send(
            "PATCH",
            &format!("/admin/orders/{unknown}/status"),
            Some(json!({ "fulfillment": "CONFIRMED" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_statistics_count_every_status() {
    let t = TestApp::new();
    let first = t.place_order(Uuid::new_v4()).await;
    let second_owner = Uuid::new_v4();
    t.add(second_owner, "SKU-MUG", 1).await;
    t.checkout(second_owner).await;

    let first_id = first["id"].as_str().unwrap();
    t.send(
        "PATCH",
        &format!("/admin/orders/{first_id}/status"),
        Some(json!({ "fulfillment": "CONFIRMED" })),
    )
    .await;

    let (status, stats) = t.send("GET", "/admin/orders/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_orders"], 2);

    let counts = stats["status_counts"].as_array().unwrap();
    assert_eq!(counts.len(), 6);
    let count = |name: &str| {
        counts
            .iter()
            .find(|c| c["status"] == name)
            .map(|c| c["count"].as_u64().unwrap())
            .unwrap()
    };
    assert_eq!(count("PENDING"), 1);
    assert_eq!(count("CONFIRMED"), 1);
    assert_eq!(count("SHIPPED"), 0);
}

#[tokio::test]
async fn test_checkout_journal_is_inspectable() {
    let t = TestApp::new();
    let owner = Uuid::new_v4();
    let order = t.place_order(owner).await;

    let (_, cart) = t.send("GET", &format!("/carts/{owner}"), None).await;
    let cart_id: AggregateId = cart["id"].as_str().unwrap().parse().unwrap();
    let saga_id = t
        .store
        .get_events_for_aggregate(cart_id)
        .await
        .unwrap()
        .iter()
        .find_map(|e| match e.decode::<CartEvent>().unwrap() {
            CartEvent::CheckoutStarted(data) => Some(data.saga_id),
            _ => None,
        })
        .unwrap();

    let (status, saga) = t.send("GET", &format!("/checkouts/{saga_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saga["state"], "Completed");
    assert_eq!(saga["order_id"], order["id"]);
    assert_eq!(saga["reservations"], 2);

    let unknown = Uuid::new_v4();
    let (status, _) = t.send("GET", &format!("/checkouts/{unknown}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = TestApp::new();
    t.place_order(Uuid::new_v4()).await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_completed_total"));
}
