//! Cart domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::OwnerId;

use super::{CartItem, CartItemId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    CartCreated(CartCreatedData),
    ItemAdded(ItemAddedData),
    ItemQuantityChanged(ItemQuantityChangedData),
    ItemRemoved(ItemRemovedData),
    CartCleared(CartClearedData),
    /// A checkout claimed the cart; mutations are refused until it ends.
    CheckoutStarted(CheckoutStartedData),
    /// The checkout committed an order; the cart is emptied and released.
    CheckoutCompleted(CheckoutCompletedData),
    /// The checkout failed; the cart is released with its items untouched.
    CheckoutAborted(CheckoutAbortedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartCreated(_) => "CartCreated",
            CartEvent::ItemAdded(_) => "ItemAdded",
            CartEvent::ItemQuantityChanged(_) => "ItemQuantityChanged",
            CartEvent::ItemRemoved(_) => "ItemRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
            CartEvent::CheckoutStarted(_) => "CheckoutStarted",
            CartEvent::CheckoutCompleted(_) => "CheckoutCompleted",
            CartEvent::CheckoutAborted(_) => "CheckoutAborted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCreatedData {
    pub cart_id: AggregateId,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAddedData {
    pub item: CartItem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemQuantityChangedData {
    pub item_id: CartItemId,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRemovedData {
    pub item_id: CartItemId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub cleared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    /// The checkout saga holding the cart.
    pub saga_id: AggregateId,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCompletedData {
    pub saga_id: AggregateId,
    pub order_id: AggregateId,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutAbortedData {
    pub saga_id: AggregateId,
    pub reason: String,
    pub aborted_at: DateTime<Utc>,
}

impl CartEvent {
    pub fn cart_created(cart_id: AggregateId, owner_id: OwnerId) -> Self {
        CartEvent::CartCreated(CartCreatedData {
            cart_id,
            owner_id,
            created_at: Utc::now(),
        })
    }

    pub fn item_added(item: CartItem) -> Self {
        CartEvent::ItemAdded(ItemAddedData { item })
    }

    pub fn item_quantity_changed(item_id: CartItemId, old_quantity: u32, new_quantity: u32) -> Self {
        CartEvent::ItemQuantityChanged(ItemQuantityChangedData {
            item_id,
            old_quantity,
            new_quantity,
            changed_at: Utc::now(),
        })
    }

    pub fn item_removed(item_id: CartItemId) -> Self {
        CartEvent::ItemRemoved(ItemRemovedData {
            item_id,
            removed_at: Utc::now(),
        })
    }

    pub fn cart_cleared() -> Self {
        CartEvent::CartCleared(CartClearedData {
            cleared_at: Utc::now(),
        })
    }

    pub fn checkout_started(saga_id: AggregateId) -> Self {
        CartEvent::CheckoutStarted(CheckoutStartedData {
            saga_id,
            started_at: Utc::now(),
        })
    }

    pub fn checkout_completed(saga_id: AggregateId, order_id: AggregateId) -> Self {
        CartEvent::CheckoutCompleted(CheckoutCompletedData {
            saga_id,
            order_id,
            completed_at: Utc::now(),
        })
    }

    pub fn checkout_aborted(saga_id: AggregateId, reason: impl Into<String>) -> Self {
        CartEvent::CheckoutAborted(CheckoutAbortedData {
            saga_id,
            reason: reason.into(),
            aborted_at: Utc::now(),
        })
    }

    /// When the event happened, used to maintain `updated_at`.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartCreated(d) => d.created_at,
            CartEvent::ItemAdded(d) => d.item.added_at,
            CartEvent::ItemQuantityChanged(d) => d.changed_at,
            CartEvent::ItemRemoved(d) => d.removed_at,
            CartEvent::CartCleared(d) => d.cleared_at,
            CartEvent::CheckoutStarted(d) => d.started_at,
            CartEvent::CheckoutCompleted(d) => d.completed_at,
            CartEvent::CheckoutAborted(d) => d.aborted_at,
        }
    }
}
