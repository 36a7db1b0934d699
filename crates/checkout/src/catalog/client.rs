//! Timeout and fallback policy around a [`CatalogService`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domain::{ProductId, ProductSnapshot};

use super::{CatalogError, CatalogService, Reservation};

pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(5);

/// Calls the catalog with a deadline and applies the fallback policy.
///
/// Read paths degrade: a lookup that fails for any reason other than a
/// definite not-found yields [`ProductSnapshot::unavailable`], and an
/// availability check that fails answers `false`. Checkout paths
/// ([`fetch_product`](Self::fetch_product), [`reserve`](Self::reserve))
/// surface every error.
#[derive(Clone)]
pub struct CatalogClient {
    catalog: Arc<dyn CatalogService>,
    timeout: Duration,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    pub fn new(catalog: impl CatalogService + 'static, timeout: Duration) -> Self {
        Self::from_arc(Arc::new(catalog), timeout)
    }

    pub fn from_arc(catalog: Arc<dyn CatalogService>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Looks a product up for display or cart use.
    ///
    /// `None` only when the catalog says the product does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn product(&self, product_id: &ProductId) -> Option<ProductSnapshot> {
        match self.bounded(self.catalog.get_product(product_id)).await {
            Ok(product) => Some(product),
            Err(CatalogError::NotFound(_)) => None,
            Err(e) => {
                tracing::warn!(%product_id, error = %e, "catalog lookup failed, using placeholder");
                Some(ProductSnapshot::unavailable(product_id.clone()))
            }
        }
    }

    /// Availability for the read path. Any failure answers `false`.
    pub async fn is_available(&self, product_id: &ProductId, quantity: u32) -> bool {
        match self
            .bounded(self.catalog.is_available(product_id, quantity))
            .await
        {
            Ok(available) => available,
            Err(e) => {
                tracing::warn!(%product_id, quantity, error = %e, "availability check failed");
                false
            }
        }
    }

    /// Current product data for freezing into an order.
    pub async fn fetch_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, CatalogError> {
        self.bounded(self.catalog.get_product(product_id)).await
    }

    pub async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Reservation, CatalogError> {
        self.bounded(self.catalog.reserve(product_id, quantity))
            .await
    }

    pub async fn release(&self, reservation: &Reservation) -> Result<(), CatalogError> {
        self.bounded(self.catalog.release(reservation)).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CatalogError>>,
    ) -> Result<T, CatalogError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CatalogError::Timeout(self.timeout))?
    }
}
