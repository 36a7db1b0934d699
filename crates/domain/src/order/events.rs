//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, OwnerId};

use super::{FulfillmentStatus, OrderItem, OrderNumber, PaymentStatus, StatusChange, StockRelease};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// The checkout committed the order.
    OrderPlaced(OrderPlacedData),

    /// One or more of statuses, transaction id, delivery dates or notes changed.
    StatusUpdated(StatusUpdatedData),

    /// The order was cancelled. Its stock is handed back afterwards.
    OrderCancelled(OrderCancelledData),

    /// How handing back the stock of a cancelled order went.
    StockReleasesRecorded(StockReleasesRecordedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::StatusUpdated(_) => "StatusUpdated",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::StockReleasesRecorded(_) => "StockReleasesRecorded",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    pub items: Vec<OrderItem>,
    pub tax: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub shipping_address: String,
    pub billing_address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub coupon_code: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub placed_at: DateTime<Utc>,
}

/// Data for StatusUpdated event. Absent fields were left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdatedData {
    pub fulfillment: Option<StatusChange<FulfillmentStatus>>,
    pub payment: Option<StatusChange<PaymentStatus>>,
    pub transaction_id: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    /// Fulfillment status the order was cancelled from.
    pub previous_status: FulfillmentStatus,
    pub previous_payment_status: PaymentStatus,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for StockReleasesRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReleasesRecordedData {
    /// One entry per order line, in line order.
    pub releases: Vec<StockRelease>,
    pub recorded_at: DateTime<Utc>,
}

impl StatusUpdatedData {
    pub fn is_empty(&self) -> bool {
        self.fulfillment.is_none()
            && self.payment.is_none()
            && self.transaction_id.is_none()
            && self.estimated_delivery.is_none()
            && self.actual_delivery.is_none()
            && self.notes.is_none()
    }
}
