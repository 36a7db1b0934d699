//! Checkout for the cart and order system.
//!
//! This crate turns a cart into an order against an external product
//! catalog. A checkout run follows these steps:
//! 1. Claim the cart at the version that was validated
//! 2. Reserve stock for every line
//! 3. Snapshot current product data into order lines
//! 4. Commit the order
//! 5. Empty the cart
//!
//! If a step fails, reservations are released in reverse order and the cart
//! is handed back untouched. Order cancellation releases stock the same way.

pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod state;
pub mod steps;

pub use aggregate::CheckoutSaga;
pub use cart::CartCoordinator;
pub use catalog::{
    CatalogClient, CatalogError, CatalogOperation, CatalogService, DEFAULT_CATALOG_TIMEOUT, Fault,
    InMemoryCatalog, Reservation,
};
pub use compensation::CompensationHandler;
pub use coordinator::{
    CheckoutCoordinator, CheckoutRequest, CheckoutSettings, DEFAULT_CHECKOUT_TIMEOUT,
    DEFAULT_DELIVERY_LEAD_DAYS,
};
pub use error::CheckoutError;
pub use events::SagaEvent;
pub use state::SagaState;
