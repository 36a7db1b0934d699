//! Integration tests: domain services → ProjectionProcessor → OrderDirectoryView.

use chrono::Utc;
use domain::{
    Aggregate, CartService, FulfillmentStatus, Money, NewOrder, Order, OrderItem, OrderNumber,
    OrderService, OwnerId, PaymentStatus, ProductSnapshot, ReservationId, StatusUpdate,
};
use event_store::InMemoryEventStore;
use projections::{OrderDirectoryView, ProjectionProcessor};

struct Harness {
    carts: CartService<InMemoryEventStore>,
    orders: OrderService<InMemoryEventStore>,
    processor: ProjectionProcessor<InMemoryEventStore>,
    directory: OrderDirectoryView,
}

fn setup() -> Harness {
    let store = InMemoryEventStore::new();
    let directory = OrderDirectoryView::new();
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(directory.clone()));

    Harness {
        carts: CartService::new(store.clone()),
        orders: OrderService::new(store),
        processor,
        directory,
    }
}

fn product() -> ProductSnapshot {
    ProductSnapshot::new("SKU-TEA", "Tea tin", Money::from_cents(1250))
}

async fn place(h: &Harness, owner: OwnerId, quantity: u32) -> Order {
    h.orders
        .place_order(NewOrder {
            order_number: OrderNumber::generate(Utc::now()),
            owner_id: owner,
            items: vec![OrderItem::from_product(&product(), quantity, ReservationId::new())],
            tax: Money::from_cents(100),
            shipping_cost: Money::ZERO,
            discount: Money::ZERO,
            shipping_address: "3 Dock Lane".to_string(),
            billing_address: None,
            phone: None,
            email: None,
            notes: None,
            payment_method: Some("card".to_string()),
            coupon_code: None,
            estimated_delivery: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_directory_follows_order_lifecycle() {
    let h = setup();
    let owner = OwnerId::new();

    // Cart traffic is interleaved with order events in the log.
    h.carts.add_item(owner, &product(), 2).await.unwrap();
    let order = place(&h, owner, 2).await;
    let order_id = order.id().unwrap();
    h.carts.clear(owner).await.unwrap();

    h.processor.run_catch_up().await.unwrap();
    let summary = h.directory.get_order(order_id).await.unwrap();
    assert_eq!(summary.final_amount, order.final_amount());
    assert_eq!(summary.total_items, 2);

    h.orders
        .update_status(order_id, StatusUpdate::payment(PaymentStatus::Completed))
        .await
        .unwrap();
    h.orders
        .update_status(order_id, StatusUpdate::fulfillment(FulfillmentStatus::Confirmed))
        .await
        .unwrap();
    h.processor.run_catch_up().await.unwrap();

    let summary = h
        .directory
        .find_by_number(order.order_number().unwrap())
        .await
        .unwrap();
    assert_eq!(summary.fulfillment_status, FulfillmentStatus::Confirmed);
    assert_eq!(summary.payment_status, PaymentStatus::Completed);

    h.orders
        .cancel_order(order_id, "customer request")
        .await
        .unwrap();
    h.processor.run_catch_up().await.unwrap();

    let summary = h.directory.get_order(order_id).await.unwrap();
    assert_eq!(summary.fulfillment_status, FulfillmentStatus::Cancelled);
    assert_eq!(summary.payment_status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_directory_lists_orders_per_owner_and_counts_statuses() {
    let h = setup();
    let alice = OwnerId::new();
    let bob = OwnerId::new();

    let first = place(&h, alice, 1).await;
    place(&h, alice, 3).await;
    place(&h, bob, 2).await;
    h.orders
        .update_status(
            first.id().unwrap(),
            StatusUpdate::fulfillment(FulfillmentStatus::Confirmed),
        )
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();

    let alices = h.directory.orders_for_owner(alice).await;
    assert_eq!(alices.len(), 2);
    assert!(alices.iter().all(|o| o.owner_id == alice));
    assert_eq!(h.directory.orders_for_owner(bob).await.len(), 1);
    assert_eq!(h.directory.len().await, 3);

    let counts = h.directory.status_counts().await;
    let pending = counts
        .iter()
        .find(|c| c.status == FulfillmentStatus::Pending)
        .unwrap();
    let confirmed = counts
        .iter()
        .find(|c| c.status == FulfillmentStatus::Confirmed)
        .unwrap();
    assert_eq!(pending.count, 2);
    assert_eq!(confirmed.count, 1);
}

#[tokio::test]
async fn test_rebuild_gives_same_directory() {
    let h = setup();
    let owner = OwnerId::new();
    for quantity in 1..=4 {
        place(&h, owner, quantity).await;
    }
    h.processor.run_catch_up().await.unwrap();
    let before = h.directory.orders_for_owner(owner).await;

    h.processor.rebuild_all().await.unwrap();

    let after = h.directory.orders_for_owner(owner).await;
    assert_eq!(after, before);
}
