//! Checkout error types.

use std::time::Duration;

use common::AggregateId;
use domain::{DomainError, ErrorKind, ProductId};
use event_store::EventStoreError;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors that can occur during cart and checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The checkout request itself is malformed.
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product {product_id} is not available in quantity {quantity}")]
    Unavailable { product_id: ProductId, quantity: u32 },

    /// Reserving and snapshotting the cart took longer than allowed.
    #[error("Checkout timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Could not allocate a unique order number after {attempts} attempts")]
    OrderNumberExhausted { attempts: u32 },

    #[error("Checkout {0} not found")]
    SagaNotFound(AggregateId),
}

impl From<EventStoreError> for CheckoutError {
    fn from(e: EventStoreError) -> Self {
        CheckoutError::Domain(e.into())
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(e: serde_json::Error) -> Self {
        CheckoutError::Domain(e.into())
    }
}

impl CheckoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Domain(e) => e.kind(),
            CheckoutError::Catalog(e) => e.kind(),
            CheckoutError::InvalidRequest(_) => ErrorKind::Validation,
            CheckoutError::EmptyCart | CheckoutError::Unavailable { .. } => ErrorKind::Conflict,
            CheckoutError::TimedOut(_) => ErrorKind::ExternalService,
            CheckoutError::OrderNumberExhausted { .. } => ErrorKind::Internal,
            CheckoutError::SagaNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
