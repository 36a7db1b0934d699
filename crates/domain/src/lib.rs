//! Domain layer for the cart and order system.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler, which loads an aggregate and appends its decisions
//! - The Cart aggregate, including the checkout claim
//! - The Order aggregate with its fulfillment and payment status machines

pub mod aggregate;
pub mod cart;
pub mod command;
pub mod error;
pub mod order;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use cart::{Cart, CartError, CartEvent, CartItem, CartItemId, CartService};
pub use command::{CommandHandler, CommandResult};
pub use error::{DomainError, ErrorKind};
pub use order::{
    FulfillmentStatus, NewOrder, Order, OrderError, OrderEvent, OrderItem, OrderNumber,
    OrderService, PaymentStatus, ReleaseOutcome, StatusUpdate, StockRelease,
};
pub use value_objects::{Money, OwnerId, ProductId, ProductSnapshot, ReservationId};
