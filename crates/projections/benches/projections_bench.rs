use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, FulfillmentStatus, Money, NewOrder, OrderItem, OrderNumber, OrderService, OwnerId,
    ProductSnapshot, ReservationId, StatusUpdate,
};
use event_store::InMemoryEventStore;
use projections::{OrderDirectoryView, Projection, ProjectionProcessor};

/// Places `n` orders and confirms every other one.
async fn populate_store(store: &InMemoryEventStore, n: usize) {
    let orders = OrderService::new(store.clone());
    let product = ProductSnapshot::new("SKU-001", "Widget", Money::from_cents(1000));

    for i in 0..n {
        let order = orders
            .place_order(NewOrder {
                order_number: OrderNumber::from(format!("ORD-BENCH-{i:06}")),
                owner_id: OwnerId::new(),
                items: vec![OrderItem::from_product(&product, 2, ReservationId::new())],
                tax: Money::ZERO,
                shipping_cost: Money::ZERO,
                discount: Money::ZERO,
                shipping_address: "1 Bench St".to_string(),
                billing_address: None,
                phone: None,
                email: None,
                notes: None,
                payment_method: None,
                coupon_code: None,
                estimated_delivery: Some(Utc::now()),
            })
            .await
            .unwrap();
        if i % 2 == 0 {
            orders
                .update_status(
                    order.id().unwrap(),
                    StatusUpdate::fulfillment(FulfillmentStatus::Confirmed),
                )
                .await
                .unwrap();
        }
    }
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for orders in [100, 1000] {
        let store = InMemoryEventStore::new();
        rt.block_on(populate_store(&store, orders));

        c.bench_function(&format!("projections/catch_up_{orders}_orders"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let view = OrderDirectoryView::new();
                    let mut processor = ProjectionProcessor::new(store.clone());
                    processor.register(Box::new(view) as Box<dyn Projection>);
                    processor.run_catch_up().await.unwrap();
                });
            });
        });
    }
}

fn bench_status_counts(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 1000));

    let view = OrderDirectoryView::new();
    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(view.clone()));
    rt.block_on(processor.run_catch_up()).unwrap();

    c.bench_function("projections/status_counts_1000_orders", |b| {
        b.iter(|| rt.block_on(view.status_counts()));
    });
}

criterion_group!(benches, bench_catch_up, bench_status_counts);
criterion_main!(benches);
