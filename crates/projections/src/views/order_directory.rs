//! Order directory read model: order-number lookup, per-owner listing and
//! status statistics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{FulfillmentStatus, Money, OrderEvent, OrderNumber, OwnerId, PaymentStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// One order as listed in the directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    pub fulfillment_status: FulfillmentStatus,
    pub payment_status: PaymentStatus,
    pub total_items: u32,
    pub final_amount: Money,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Number of orders in one fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: FulfillmentStatus,
    pub count: usize,
}

#[derive(Default)]
struct DirectoryState {
    orders: HashMap<AggregateId, OrderSummary>,
    by_number: HashMap<OrderNumber, AggregateId>,
    by_owner: HashMap<OwnerId, Vec<AggregateId>>,
    position: ProjectionPosition,
}

/// Read model over every placed order.
///
/// Only `Order` events are read; everything else just advances the position.
#[derive(Clone, Default)]
pub struct OrderDirectoryView {
    state: Arc<RwLock<DirectoryState>>,
}

impl OrderDirectoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of orders in the directory.
    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Option<OrderSummary> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    pub async fn find_by_number(&self, order_number: &OrderNumber) -> Option<OrderSummary> {
        let state = self.state.read().await;
        state
            .by_number
            .get(order_number)
            .and_then(|id| state.orders.get(id))
            .cloned()
    }

    /// The owner's orders, newest first.
    pub async fn orders_for_owner(&self, owner_id: OwnerId) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        let mut orders: Vec<OrderSummary> = state
            .by_owner
            .get(&owner_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.orders.get(id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    /// Order counts for every fulfillment status, zero counts included.
    pub async fn status_counts(&self) -> Vec<StatusCount> {
        let state = self.state.read().await;
        FulfillmentStatus::ALL
            .iter()
            .map(|&status| StatusCount {
                status,
                count: state
                    .orders
                    .values()
                    .filter(|o| o.fulfillment_status == status)
                    .count(),
            })
            .collect()
    }
}

#[async_trait]
impl Projection for OrderDirectoryView {
    fn name(&self) -> &'static str {
        "OrderDirectoryView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        // Advanced up front so an undecodable event is reported once, not on every catch-up.
        state.position = state.position.after(event);
        if event.aggregate_type != "Order" {
            return Ok(());
        }

        let order_id = event.aggregate_id;
        match event.decode::<OrderEvent>()? {
            OrderEvent::OrderPlaced(data) => {
                let subtotal: Money = data.items.iter().map(|i| i.line_total()).sum();
                let summary = OrderSummary {
                    order_id,
                    order_number: data.order_number.clone(),
                    owner_id: data.owner_id,
                    fulfillment_status: FulfillmentStatus::Pending,
                    payment_status: PaymentStatus::Pending,
                    total_items: data.items.iter().map(|i| i.quantity).sum(),
                    final_amount: subtotal + data.tax + data.shipping_cost - data.discount,
                    placed_at: data.placed_at,
                    updated_at: data.placed_at,
                };
                state.by_number.insert(data.order_number, order_id);
                state.by_owner.entry(data.owner_id).or_default().push(order_id);
                state.orders.insert(order_id, summary);
            }
            OrderEvent::StatusUpdated(data) => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    if let Some(change) = data.fulfillment {
                        order.fulfillment_status = change.to;
                    }
                    if let Some(change) = data.payment {
                        order.payment_status = change.to;
                    }
                    order.updated_at = data.updated_at;
                }
            }
            OrderEvent::OrderCancelled(data) => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    order.fulfillment_status = FulfillmentStatus::Cancelled;
                    order.payment_status = PaymentStatus::Refunded;
                    order.updated_at = data.cancelled_at;
                }
            }
            OrderEvent::StockReleasesRecorded(data) => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    order.updated_at = data.recorded_at;
                }
            }
        }

        metrics::counter!("projection_events_applied_total", "projection" => "order_directory")
            .increment(1);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = DirectoryState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{
        Aggregate, DomainEvent, NewOrder, Order, OrderItem, ProductSnapshot, ReservationId,
        StatusUpdate,
    };

    fn envelope(order_id: AggregateId, version: i64, event: &OrderEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(order_id)
            .aggregate_type("Order")
            .event_type(event.event_type())
            .version(event_store::Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn new_order(owner_id: OwnerId, number: &str) -> NewOrder {
        let product = ProductSnapshot::new("SKU-1", "Kettle", Money::from_cents(2500));
        NewOrder {
            order_number: OrderNumber::from(number),
            owner_id,
            items: vec![OrderItem::from_product(&product, 2, ReservationId::new())],
            tax: Money::from_cents(400),
            shipping_cost: Money::from_cents(600),
            discount: Money::from_cents(500),
            shipping_address: "5 Quay Rd".to_string(),
            billing_address: None,
            phone: None,
            email: None,
            notes: None,
            payment_method: None,
            coupon_code: None,
            estimated_delivery: None,
        }
    }

    /// Places an order through the aggregate and feeds its events to the view.
    async fn place(view: &OrderDirectoryView, owner_id: OwnerId, number: &str) -> Order {
        let new = new_order(owner_id, number);
        let order_id = Order::id_for(&new.order_number);
        let mut order = Order::default();
        for event in order.place(new).unwrap() {
            view.handle(&envelope(order_id, 1, &event)).await.unwrap();
            order.apply(event);
        }
        order.set_version(event_store::Version::new(1));
        order
    }

    #[tokio::test]
    async fn placed_order_is_listed_with_totals() {
        let view = OrderDirectoryView::new();
        let owner = OwnerId::new();
        let order = place(&view, owner, "ORD-1-001").await;

        let summary = view.get_order(order.id().unwrap()).await.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.final_amount, Money::from_cents(5500));
        assert_eq!(summary.final_amount, order.final_amount());
        assert_eq!(summary.fulfillment_status, FulfillmentStatus::Pending);

        let by_number = view
            .find_by_number(&OrderNumber::from("ORD-1-001"))
            .await
            .unwrap();
        assert_eq!(by_number.order_id, summary.order_id);
        assert!(view.find_by_number(&OrderNumber::from("ORD-9-999")).await.is_none());
    }

    #[tokio::test]
    async fn listing_is_per_owner() {
        let view = OrderDirectoryView::new();
        let alice = OwnerId::new();
        let bob = OwnerId::new();
        place(&view, alice, "ORD-1-001").await;
        place(&view, alice, "ORD-1-002").await;
        place(&view, bob, "ORD-1-003").await;

        assert_eq!(view.orders_for_owner(alice).await.len(), 2);
        assert_eq!(view.orders_for_owner(bob).await.len(), 1);
        assert!(view.orders_for_owner(OwnerId::new()).await.is_empty());
        assert_eq!(view.len().await, 3);
    }

    #[tokio::test]
    async fn status_changes_and_cancellation_are_tracked() {
        let view = OrderDirectoryView::new();
        let shipped = place(&view, OwnerId::new(), "ORD-1-001").await;
        let cancelled = place(&view, OwnerId::new(), "ORD-1-002").await;
        place(&view, OwnerId::new(), "ORD-1-003").await;

        let events = shipped
            .update_status(StatusUpdate::fulfillment(FulfillmentStatus::Confirmed))
            .unwrap();
        for event in &events {
            view.handle(&envelope(shipped.id().unwrap(), 2, event))
                .await
                .unwrap();
        }
        for event in &cancelled.cancel("changed mind").unwrap() {
            view.handle(&envelope(cancelled.id().unwrap(), 2, event))
                .await
                .unwrap();
        }

        let summary = view.get_order(cancelled.id().unwrap()).await.unwrap();
        assert_eq!(summary.payment_status, PaymentStatus::Refunded);

        let counts = view.status_counts().await;
        assert_eq!(counts.len(), FulfillmentStatus::ALL.len());
        let count = |status| counts.iter().find(|c| c.status == status).unwrap().count;
        assert_eq!(count(FulfillmentStatus::Pending), 1);
        assert_eq!(count(FulfillmentStatus::Confirmed), 1);
        assert_eq!(count(FulfillmentStatus::Cancelled), 1);
        assert_eq!(count(FulfillmentStatus::Delivered), 0);
    }

    #[tokio::test]
    async fn other_aggregates_only_advance_position() {
        let view = OrderDirectoryView::new();
        let event = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Cart")
            .event_type("CartCleared")
            .version(event_store::Version::new(1))
            .payload_raw(serde_json::json!({"type": "CartCleared"}))
            .build()
            .unwrap();

        view.handle(&event).await.unwrap();

        assert_eq!(view.position().await.offset, 1);
        assert!(view.is_empty().await);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let view = OrderDirectoryView::new();
        let owner = OwnerId::new();
        place(&view, owner, "ORD-1-001").await;

        view.reset().await.unwrap();

        assert!(view.orders_for_owner(owner).await.is_empty());
        assert_eq!(view.position().await, ProjectionPosition::start());
    }
}
