//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod item;
mod number;
mod service;
mod status;

pub use aggregate::Order;
pub use commands::{NewOrder, StatusUpdate};
pub use events::{
    OrderCancelledData, OrderEvent, OrderPlacedData, StatusUpdatedData, StockReleasesRecordedData,
};
pub use item::{OrderItem, ReleaseOutcome, StockRelease};
pub use number::OrderNumber;
pub use service::OrderService;
pub use status::{FulfillmentStatus, PaymentStatus, StatusChange};

use thiserror::Error;

use crate::error::ErrorKind;
use crate::value_objects::{Money, ProductId};

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order not found")]
    NotPlaced,

    #[error("Order has no items")]
    EmptyOrder,

    #[error("Order line {product_id} has zero quantity")]
    ZeroQuantity { product_id: ProductId },

    #[error("Order {field} must not be negative, got {amount}")]
    NegativeAmount { field: &'static str, amount: Money },

    #[error("Shipping address is required")]
    MissingShippingAddress,

    #[error("Order total must not be negative, got {total}")]
    NegativeTotal { total: Money },

    #[error("Order amounts exceed the representable range")]
    AmountOverflow,

    #[error("Order {order_number} already exists")]
    AlreadyExists { order_number: OrderNumber },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidFulfillmentTransition {
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    },

    #[error("Invalid payment status transition from {from} to {to}")]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },

    /// Cancellation has to release stock, so it has its own operation.
    #[error("Orders are cancelled through the cancel operation, not a status update")]
    CancelViaStatusUpdate,

    #[error("Order cannot be cancelled in {status} status")]
    NotCancellable { status: FulfillmentStatus },

    #[error("Stock releases can only be recorded for a cancelled order, order is {status}")]
    NotCancelled { status: FulfillmentStatus },

    #[error("Stock releases are already recorded for this order")]
    ReleasesAlreadyRecorded,
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::NotPlaced => ErrorKind::NotFound,
            OrderError::EmptyOrder
            | OrderError::ZeroQuantity { .. }
            | OrderError::NegativeAmount { .. }
            | OrderError::MissingShippingAddress
            | OrderError::NegativeTotal { .. }
            | OrderError::AmountOverflow => ErrorKind::Validation,
            OrderError::AlreadyExists { .. }
            | OrderError::InvalidFulfillmentTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::CancelViaStatusUpdate
            | OrderError::NotCancellable { .. }
            | OrderError::NotCancelled { .. }
            | OrderError::ReleasesAlreadyRecorded => ErrorKind::Conflict,
        }
    }
}
