//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::value_objects::{Money, OwnerId};

use super::events::{
    OrderCancelledData, OrderPlacedData, StatusUpdatedData, StockReleasesRecordedData,
};
use super::{
    FulfillmentStatus, NewOrder, OrderError, OrderEvent, OrderItem, OrderNumber, PaymentStatus,
    StatusChange, StatusUpdate, StockRelease,
};

const ORDER_NAMESPACE: Uuid = Uuid::from_u128(0x9a4e_1d07_52c3_4f88_b6e0_7c2d_19f3_0b5e);

/// Order aggregate root.
///
/// Items and monetary inputs are fixed when the order is placed; afterwards
/// only the two status axes, transaction id, delivery dates and notes move.
/// Subtotal and final amount are always derived from the stored inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    order_number: Option<OrderNumber>,
    owner_id: Option<OwnerId>,
    items: Vec<OrderItem>,

    tax: Money,
    shipping_cost: Money,
    discount: Money,

    fulfillment_status: FulfillmentStatus,
    payment_status: PaymentStatus,

    shipping_address: String,
    billing_address: String,
    phone: Option<String>,
    email: Option<String>,
    notes: Option<String>,
    payment_method: Option<String>,
    transaction_id: Option<String>,
    coupon_code: Option<String>,

    estimated_delivery: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,

    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,

    /// Per-line outcome of the stock release done at cancellation.
    stock_releases: Vec<StockRelease>,
    cancellation_reason: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::StatusUpdated(data) => self.apply_status_updated(data),
            OrderEvent::OrderCancelled(data) => self.apply_cancelled(data),
            OrderEvent::StockReleasesRecorded(data) => self.apply_releases_recorded(data),
        }
    }
}

impl SnapshotCapable for Order {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl Order {
    /// The aggregate id of the order with `order_number`.
    pub fn id_for(order_number: &OrderNumber) -> AggregateId {
        AggregateId::derived(&ORDER_NAMESPACE, order_number.as_str())
    }

    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn tax(&self) -> Money {
        self.tax
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    /// `subtotal + tax + shipping - discount`.
    pub fn final_amount(&self) -> Money {
        self.subtotal() + self.tax + self.shipping_cost - self.discount
    }

    /// Sum of quantities over all lines.
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn fulfillment_status(&self) -> FulfillmentStatus {
        self.fulfillment_status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.fulfillment_status.can_be_cancelled()
    }

    pub fn is_delivered(&self) -> bool {
        self.fulfillment_status == FulfillmentStatus::Delivered
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &str {
        &self.billing_address
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn stock_releases(&self) -> &[StockRelease] {
        &self.stock_releases
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }
}

// Command methods (return events)
impl Order {
    /// Commits a new order.
    pub fn place(&self, new: NewOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyExists {
                order_number: new.order_number,
            });
        }
        if new.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if let Some(item) = new.items.iter().find(|i| i.quantity == 0) {
            return Err(OrderError::ZeroQuantity {
                product_id: item.product_id.clone(),
            });
        }
        for (field, amount) in [
            ("tax", new.tax),
            ("shipping", new.shipping_cost),
            ("discount", new.discount),
        ] {
            if amount.is_negative() {
                return Err(OrderError::NegativeAmount { field, amount });
            }
        }
        let shipping_address = new.shipping_address.trim().to_string();
        if shipping_address.is_empty() {
            return Err(OrderError::MissingShippingAddress);
        }

        let total = new
            .items
            .iter()
            .map(OrderItem::checked_line_total)
            .chain([Some(new.tax), Some(new.shipping_cost)])
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount?))
            .and_then(|gross| gross.checked_sub(new.discount))
            .ok_or(OrderError::AmountOverflow)?;
        if total.is_negative() {
            return Err(OrderError::NegativeTotal { total });
        }

        let billing_address = new
            .billing_address
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| shipping_address.clone());

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: Order::id_for(&new.order_number),
            order_number: new.order_number,
            owner_id: new.owner_id,
            items: new.items,
            tax: new.tax,
            shipping_cost: new.shipping_cost,
            discount: new.discount,
            shipping_address,
            billing_address,
            phone: new.phone,
            email: new.email,
            notes: new.notes,
            payment_method: new.payment_method,
            coupon_code: new.coupon_code,
            estimated_delivery: new.estimated_delivery,
            placed_at: Utc::now(),
        })])
    }

    /// Applies a partial status update.
    ///
    /// Supplied values equal to the current ones are ignored; an update that
    /// changes nothing records nothing. Cancellation is refused here because
    /// it has to release stock.
    pub fn update_status(&self, update: StatusUpdate) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        let now = Utc::now();

        let fulfillment = match update.fulfillment {
            Some(next) if next != self.fulfillment_status => {
                if next == FulfillmentStatus::Cancelled {
                    return Err(OrderError::CancelViaStatusUpdate);
                }
                if !self.fulfillment_status.can_transition_to(next) {
                    return Err(OrderError::InvalidFulfillmentTransition {
                        from: self.fulfillment_status,
                        to: next,
                    });
                }
                Some(StatusChange {
                    from: self.fulfillment_status,
                    to: next,
                })
            }
            _ => None,
        };

        let payment = match update.payment {
            Some(next) if next != self.payment_status => {
                if !self.payment_status.can_transition_to(next) {
                    return Err(OrderError::InvalidPaymentTransition {
                        from: self.payment_status,
                        to: next,
                    });
                }
                Some(StatusChange {
                    from: self.payment_status,
                    to: next,
                })
            }
            _ => None,
        };

        let delivered_now = fulfillment.is_some_and(|c| c.to == FulfillmentStatus::Delivered);
        let actual_delivery = match update.actual_delivery {
            Some(at) => changed(Some(at), self.actual_delivery),
            None if delivered_now && self.actual_delivery.is_none() => Some(now),
            None => None,
        };

        let data = StatusUpdatedData {
            fulfillment,
            payment,
            transaction_id: changed(update.transaction_id, self.transaction_id.clone()),
            estimated_delivery: changed(update.estimated_delivery, self.estimated_delivery),
            actual_delivery,
            notes: changed(update.notes, self.notes.clone()),
            updated_at: now,
        };

        if data.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::StatusUpdated(data)])
    }

    /// Refuses with a conflict unless the order can still be cancelled.
    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        self.ensure_placed()?;
        if !self.can_be_cancelled() {
            return Err(OrderError::NotCancellable {
                status: self.fulfillment_status,
            });
        }
        Ok(())
    }

    /// Cancels the order.
    ///
    /// Payment is forced to `Refunded` whatever its previous state. The stock
    /// is released only after this event is stored, and the outcome follows
    /// in [`record_releases`](Self::record_releases).
    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_cancellable()?;

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            previous_status: self.fulfillment_status,
            previous_payment_status: self.payment_status,
            cancelled_at: Utc::now(),
        })])
    }

    /// Records how each line's stock release went after a cancellation.
    pub fn record_releases(
        &self,
        releases: Vec<StockRelease>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.fulfillment_status != FulfillmentStatus::Cancelled {
            return Err(OrderError::NotCancelled {
                status: self.fulfillment_status,
            });
        }
        if !self.stock_releases.is_empty() {
            return Err(OrderError::ReleasesAlreadyRecorded);
        }

        Ok(vec![OrderEvent::StockReleasesRecorded(
            StockReleasesRecordedData {
                releases,
                recorded_at: Utc::now(),
            },
        )])
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }
}

fn changed<T: PartialEq>(supplied: Option<T>, current: Option<T>) -> Option<T> {
    supplied.filter(|value| current.as_ref() != Some(value))
}

// Apply event helpers
impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.order_number = Some(data.order_number);
        self.owner_id = Some(data.owner_id);
        self.items = data.items;
        self.tax = data.tax;
        self.shipping_cost = data.shipping_cost;
        self.discount = data.discount;
        self.fulfillment_status = FulfillmentStatus::Pending;
        self.payment_status = PaymentStatus::Pending;
        self.shipping_address = data.shipping_address;
        self.billing_address = data.billing_address;
        self.phone = data.phone;
        self.email = data.email;
        self.notes = data.notes;
        self.payment_method = data.payment_method;
        self.coupon_code = data.coupon_code;
        self.estimated_delivery = data.estimated_delivery;
        self.created_at = Some(data.placed_at);
        self.updated_at = Some(data.placed_at);
    }

    fn apply_status_updated(&mut self, data: StatusUpdatedData) {
        if let Some(change) = data.fulfillment {
            self.fulfillment_status = change.to;
        }
        if let Some(change) = data.payment {
            self.payment_status = change.to;
        }
        if data.transaction_id.is_some() {
            self.transaction_id = data.transaction_id;
        }
        if data.estimated_delivery.is_some() {
            self.estimated_delivery = data.estimated_delivery;
        }
        if data.actual_delivery.is_some() {
            self.actual_delivery = data.actual_delivery;
        }
        if data.notes.is_some() {
            self.notes = data.notes;
        }
        self.updated_at = Some(data.updated_at);
    }

    fn apply_cancelled(&mut self, data: OrderCancelledData) {
        self.fulfillment_status = FulfillmentStatus::Cancelled;
        self.payment_status = PaymentStatus::Refunded;
        self.cancellation_reason = Some(data.reason);
        self.updated_at = Some(data.cancelled_at);
    }

    fn apply_releases_recorded(&mut self, data: StockReleasesRecordedData) {
        self.stock_releases = data.releases;
        self.updated_at = Some(data.recorded_at);
    }
}
