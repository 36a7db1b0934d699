//! Cart aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::value_objects::{Money, OwnerId, ProductSnapshot};

use super::{CartError, CartEvent, CartItem, CartItemId};

/// Smallest quantity a single add or update may request.
pub const MIN_QUANTITY: u32 = 1;
/// Largest quantity a single add or update may request.
pub const MAX_QUANTITY: u32 = 100;

const CART_NAMESPACE: Uuid = Uuid::from_u128(0x3b0f_6a52_9d1e_4c7a_8e21_5f0c_aa10_c4a7);

/// An owner's shopping cart.
///
/// There is exactly one cart per owner: its aggregate id is derived from the
/// owner id, so it is created lazily on first use and never deleted. Totals
/// are recomputed from the lines after every applied event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    owner_id: Option<OwnerId>,

    /// Lines in the order they were first added.
    items: Vec<CartItem>,

    total_amount: Money,

    total_items: u32,

    /// Saga currently holding the cart, if any.
    checkout: Option<AggregateId>,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
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
        self.updated_at = Some(event.occurred_at());

        match event {
            CartEvent::CartCreated(data) => {
                self.id = Some(data.cart_id);
                self.owner_id = Some(data.owner_id);
                self.created_at = Some(data.created_at);
            }
            CartEvent::ItemAdded(data) => self.items.push(data.item),
            CartEvent::ItemQuantityChanged(data) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.item_id == data.item_id) {
                    item.quantity = data.new_quantity;
                }
            }
            CartEvent::ItemRemoved(data) => self.items.retain(|i| i.item_id != data.item_id),
            CartEvent::CartCleared(_) => self.items.clear(),
            CartEvent::CheckoutStarted(data) => self.checkout = Some(data.saga_id),
            CartEvent::CheckoutCompleted(_) => {
                self.items.clear();
                self.checkout = None;
            }
            CartEvent::CheckoutAborted(_) => self.checkout = None,
        }

        self.recompute_totals();
    }
}

impl SnapshotCapable for Cart {
    fn snapshot_interval() -> usize {
        50
    }
}

// Queries
impl Cart {
    /// The aggregate id of `owner`'s cart.
    pub fn id_for(owner_id: OwnerId) -> AggregateId {
        AggregateId::derived(&CART_NAMESPACE, owner_id.as_uuid().as_bytes())
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Sum of quantities over all lines.
    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn checkout_in_progress(&self) -> bool {
        self.checkout.is_some()
    }

    pub fn active_checkout(&self) -> Option<AggregateId> {
        self.checkout
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

// Commands
impl Cart {
    /// Creates the cart for `owner_id`.
    pub fn open(&self, owner_id: OwnerId) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Err(CartError::AlreadyCreated);
        }
        Ok(vec![CartEvent::cart_created(Cart::id_for(owner_id), owner_id)])
    }

    /// Adds `quantity` of `product`, merging into an existing line for the
    /// same product. Creates the cart first if it does not exist yet.
    pub fn add_item(
        &self,
        owner_id: OwnerId,
        product: &ProductSnapshot,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        validate_quantity(quantity)?;
        self.ensure_unlocked()?;

        let mut events = Vec::with_capacity(2);
        if self.id.is_none() {
            events.extend(self.open(owner_id)?);
        }

        match self.line_for(product) {
            Some(existing) => events.push(CartEvent::item_quantity_changed(
                existing.item_id,
                existing.quantity,
                existing.quantity + quantity,
            )),
            None => events.push(CartEvent::item_added(CartItem::from_product(product, quantity))),
        }

        Ok(events)
    }

    pub fn update_item_quantity(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        validate_quantity(quantity)?;
        self.ensure_unlocked()?;

        let item = self.item(item_id).ok_or(CartError::ItemNotFound { item_id })?;
        if item.quantity == quantity {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::item_quantity_changed(
            item_id,
            item.quantity,
            quantity,
        )])
    }

    pub fn remove_item(&self, item_id: CartItemId) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_unlocked()?;

        if self.item(item_id).is_none() {
            return Err(CartError::ItemNotFound { item_id });
        }
        Ok(vec![CartEvent::item_removed(item_id)])
    }

    /// Empties the cart. Clearing an empty cart records nothing.
    pub fn clear(&self) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_unlocked()?;

        if self.items.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::cart_cleared()])
    }

    /// Claims the cart for checkout `saga_id`.
    ///
    /// `validated_version` is the version the caller checked availability
    /// against; any change since then is a conflict.
    pub fn begin_checkout(
        &self,
        saga_id: AggregateId,
        validated_version: Version,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_none() || self.items.is_empty() {
            return Err(CartError::Empty);
        }
        self.ensure_unlocked()?;
        if self.version != validated_version {
            return Err(CartError::Changed {
                expected: validated_version,
                actual: self.version,
            });
        }
        Ok(vec![CartEvent::checkout_started(saga_id)])
    }

    /// Empties the cart and releases the claim held by `saga_id`.
    pub fn complete_checkout(
        &self,
        saga_id: AggregateId,
        order_id: AggregateId,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.checkout != Some(saga_id) {
            return Err(CartError::NotClaimedBy { saga_id });
        }
        Ok(vec![CartEvent::checkout_completed(saga_id, order_id)])
    }

    /// Releases the claim held by `saga_id` without touching the items.
    ///
    /// Records nothing if `saga_id` does not hold the cart.
    pub fn abort_checkout(
        &self,
        saga_id: AggregateId,
        reason: impl Into<String>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.checkout != Some(saga_id) {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::checkout_aborted(saga_id, reason)])
    }
}

impl Cart {
    fn ensure_unlocked(&self) -> Result<(), CartError> {
        match self.checkout {
            Some(saga_id) => Err(CartError::CheckoutInProgress { saga_id }),
            None => Ok(()),
        }
    }

    fn line_for(&self, product: &ProductSnapshot) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|i| i.product_id == product.product_id)
    }

    fn recompute_totals(&mut self) {
        self.total_amount = self.items.iter().map(CartItem::line_total).sum();
        self.total_items = self.items.iter().map(|i| i.quantity).sum();
    }
}

fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if (MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(CartError::InvalidQuantity { quantity })
    }
}
