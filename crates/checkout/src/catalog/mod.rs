//! Catalog collaborator: product data, availability and stock reservations.

mod client;
mod memory;

pub use client::{CatalogClient, DEFAULT_CATALOG_TIMEOUT};
pub use memory::{CatalogOperation, Fault, InMemoryCatalog};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ErrorKind, ProductId, ProductSnapshot, ReservationId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit of stock held for a checkout until it commits or is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub reserved_at: DateTime<Utc>,
}

/// Errors returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Product {0} not found")]
    NotFound(ProductId),

    #[error("Product {0} is not available")]
    Inactive(ProductId),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Catalog call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Inactive(_) | CatalogError::InsufficientStock { .. } => {
                ErrorKind::Conflict
            }
            CatalogError::Timeout(_) | CatalogError::Unavailable(_) => ErrorKind::ExternalService,
        }
    }
}

/// The catalog contract the checkout depends on.
///
/// `reserve` must check and decrement stock atomically. `release` must be
/// idempotent: releasing an unknown or already released reservation is `Ok`.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, CatalogError>;

    /// True if the product is active and has at least `quantity` in stock.
    async fn is_available(&self, product_id: &ProductId, quantity: u32)
    -> Result<bool, CatalogError>;

    async fn reserve(&self, product_id: &ProductId, quantity: u32)
    -> Result<Reservation, CatalogError>;

    async fn release(&self, reservation: &Reservation) -> Result<(), CatalogError>;
}
