//! Cart aggregate and related types.

mod aggregate;
mod events;
mod item;
mod service;

pub use aggregate::{Cart, MAX_QUANTITY, MIN_QUANTITY};
pub use events::{
    CartClearedData, CartCreatedData, CartEvent, CheckoutAbortedData, CheckoutCompletedData,
    CheckoutStartedData, ItemAddedData, ItemQuantityChangedData, ItemRemovedData,
};
pub use item::{CartItem, CartItemId};
pub use service::CartService;

use common::AggregateId;
use event_store::Version;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors returned by cart commands.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY}, got {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("Cart item not found: {item_id}")]
    ItemNotFound { item_id: CartItemId },

    #[error("Cart is empty")]
    Empty,

    #[error("Cart is locked by checkout {saga_id}")]
    CheckoutInProgress { saga_id: AggregateId },

    #[error("Cart changed during checkout: validated version {expected}, now {actual}")]
    Changed { expected: Version, actual: Version },

    #[error("Cart is not held by checkout {saga_id}")]
    NotClaimedBy { saga_id: AggregateId },

    #[error("Cart already exists")]
    AlreadyCreated,
}

impl CartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::InvalidQuantity { .. } => ErrorKind::Validation,
            CartError::ItemNotFound { .. } => ErrorKind::NotFound,
            CartError::Empty
            | CartError::CheckoutInProgress { .. }
            | CartError::Changed { .. }
            | CartError::NotClaimedBy { .. }
            | CartError::AlreadyCreated => ErrorKind::Conflict,
        }
    }
}
