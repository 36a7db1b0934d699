//! In-memory catalog with a reservation ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use domain::{ProductId, ProductSnapshot, ReservationId};

use super::{CatalogError, CatalogService, Reservation};

/// Catalog calls that faults can be injected into and that are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOperation {
    GetProduct,
    IsAvailable,
    Reserve,
    Release,
}

/// An injected misbehaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The call fails with [`CatalogError::Unavailable`].
    Fail,
    /// The call sleeps this long before doing its work.
    Delay(Duration),
}

#[derive(Debug, Default)]
struct Ledger {
    products: HashMap<ProductId, ProductSnapshot>,
    reservations: HashMap<ReservationId, Reservation>,
    /// `None` as the product applies the fault to every product.
    faults: HashMap<(CatalogOperation, Option<ProductId>), Fault>,
    calls: HashMap<CatalogOperation, usize>,
}

impl Ledger {
    fn fault_for(&self, op: CatalogOperation, product_id: &ProductId) -> Option<Fault> {
        self.faults
            .get(&(op, Some(product_id.clone())))
            .or_else(|| self.faults.get(&(op, None)))
            .copied()
    }

    fn product(&self, product_id: &ProductId) -> Result<&ProductSnapshot, CatalogError> {
        self.products
            .get(product_id)
            .ok_or_else(|| CatalogError::NotFound(product_id.clone()))
    }
}

/// Catalog that keeps products and reservations in memory.
///
/// Stock checks and decrements happen under one lock, so concurrent
/// reservations never oversell. Faults can be injected per operation and per
/// product to exercise timeout and outage handling.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(self, product: ProductSnapshot) -> Self {
        self.upsert_product(product);
        self
    }

    /// Adds or replaces a product.
    pub fn upsert_product(&self, product: ProductSnapshot) {
        self.ledger()
            .products
            .insert(product.product_id.clone(), product);
    }

    /// Edits a product in place. Returns false if it does not exist.
    pub fn update_product(
        &self,
        product_id: &ProductId,
        edit: impl FnOnce(&mut ProductSnapshot),
    ) -> bool {
        match self.ledger().products.get_mut(product_id) {
            Some(product) => {
                edit(product);
                true
            }
            None => false,
        }
    }

    pub fn stock(&self, product_id: &ProductId) -> Option<u32> {
        self.ledger().products.get(product_id).map(|p| p.stock)
    }

    /// Number of reservations not yet released.
    pub fn active_reservations(&self) -> usize {
        self.ledger().reservations.len()
    }

    pub fn has_reservation(&self, reservation_id: ReservationId) -> bool {
        self.ledger().reservations.contains_key(&reservation_id)
    }

    /// Injects `fault` into `op`, for one product or for all of them.
    pub fn inject(&self, op: CatalogOperation, product_id: Option<&ProductId>, fault: Fault) {
        self.ledger()
            .faults
            .insert((op, product_id.cloned()), fault);
    }

    pub fn clear_faults(&self) {
        self.ledger().faults.clear();
    }

    /// How many times `op` was called, faulted calls included.
    pub fn calls(&self, op: CatalogOperation) -> usize {
        self.ledger().calls.get(&op).copied().unwrap_or(0)
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call and plays any injected fault. The lock is released
    /// before sleeping.
    async fn enter(&self, op: CatalogOperation, product_id: &ProductId) -> Result<(), CatalogError> {
        let fault = {
            let mut ledger = self.ledger();
            *ledger.calls.entry(op).or_default() += 1;
            ledger.fault_for(op, product_id)
        };

        match fault {
            Some(Fault::Fail) => Err(CatalogError::Unavailable(format!(
                "injected failure in {op:?} for {product_id}"
            ))),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, CatalogError> {
        self.enter(CatalogOperation::GetProduct, product_id).await?;
        self.ledger().product(product_id).cloned()
    }

    async fn is_available(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, CatalogError> {
        self.enter(CatalogOperation::IsAvailable, product_id).await?;
        Ok(self.ledger().product(product_id)?.can_supply(quantity))
    }

    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Reservation, CatalogError> {
        self.enter(CatalogOperation::Reserve, product_id).await?;

        let mut ledger = self.ledger();
        let product = ledger
            .products
            .get_mut(product_id)
            .ok_or_else(|| CatalogError::NotFound(product_id.clone()))?;
        if !product.active {
            return Err(CatalogError::Inactive(product_id.clone()));
        }
        if product.stock < quantity {
            return Err(CatalogError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;

        let reservation = Reservation {
            reservation_id: ReservationId::new(),
            product_id: product_id.clone(),
            quantity,
            reserved_at: Utc::now(),
        };
        ledger
            .reservations
            .insert(reservation.reservation_id, reservation.clone());
        Ok(reservation)
    }

    async fn release(&self, reservation: &Reservation) -> Result<(), CatalogError> {
        self.enter(CatalogOperation::Release, &reservation.product_id)
            .await?;

        let mut ledger = self.ledger();
        let Some(held) = ledger.reservations.remove(&reservation.reservation_id) else {
            return Ok(());
        };
        if let Some(product) = ledger.products.get_mut(&held.product_id) {
            product.stock += held.quantity;
        }
        Ok(())
    }
}
