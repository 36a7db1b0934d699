use chrono::Utc;
use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, Cart, CartEvent, CartItem, CartService, Money, NewOrder, OrderItem, OrderNumber,
    OrderService, OwnerId, ProductSnapshot, ReservationId,
};
use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version, store::EventStore};

fn product(n: i64) -> ProductSnapshot {
    ProductSnapshot::new(format!("SKU-{n:03}"), format!("Product {n}"), Money::from_cents(100 * n))
        .with_stock(1_000)
}

fn make_envelope(aggregate_id: AggregateId, version: i64, event: &CartEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Cart")
        .event_type(domain::DomainEvent::event_type(event))
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

fn new_order(owner_id: OwnerId) -> NewOrder {
    NewOrder {
        order_number: OrderNumber::generate(Utc::now()),
        owner_id,
        items: (1..=3)
            .map(|n| OrderItem::from_product(&product(n), 1, ReservationId::new()))
            .collect(),
        tax: Money::ZERO,
        shipping_cost: Money::from_cents(500),
        discount: Money::ZERO,
        shipping_address: "1 Bench Way".to_string(),
        billing_address: None,
        phone: None,
        email: None,
        notes: None,
        payment_method: None,
        coupon_code: None,
        estimated_delivery: None,
    }
}

fn bench_cart_add_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = CartService::new(InMemoryEventStore::new());
    let owner = OwnerId::new();
    let widget = product(1);

    c.bench_function("domain/cart_add_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                if let Err(e) = service.add_item(owner, &widget, 1).await {
                    // Quantity cap reached; start over.
                    assert_eq!(e.kind(), domain::ErrorKind::Validation);
                    service.clear(owner).await.unwrap();
                }
            });
        });
    });
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = OrderService::new(InMemoryEventStore::new());
                service.place_order(new_order(OwnerId::new())).await.unwrap();
            });
        });
    });
}

fn bench_cart_reconstruction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let owner = OwnerId::new();
    let cart_id = Cart::id_for(owner);

    // Pre-populate: 1 create + 99 add-item events
    rt.block_on(async {
        let created = CartEvent::cart_created(cart_id, owner);
        let mut events = vec![make_envelope(cart_id, 1, &created)];
        for v in 2..=100 {
            let added = CartEvent::item_added(CartItem::from_product(&product(v), 1));
            events.push(make_envelope(cart_id, v, &added));
        }
        store.append(events, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("domain/reconstruct_cart_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events_for_aggregate(cart_id).await.unwrap();
                let mut cart = Cart::default();
                for event in &events {
                    let domain_event: CartEvent = event.decode().unwrap();
                    cart.apply(domain_event);
                }
                assert_eq!(cart.items().len(), 99);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_cart_add_item,
    bench_place_order,
    bench_cart_reconstruction,
);
criterion_main!(benches);
