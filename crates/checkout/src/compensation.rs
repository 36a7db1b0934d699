//! Hands reserved stock back to the catalog.

use common::AggregateId;
use domain::{DomainError, Order, OrderService, OwnerId, ReleaseOutcome, StockRelease};
use event_store::EventStore;

use crate::catalog::{CatalogClient, Reservation};
use crate::error::Result;

/// Releases stock for cancelled orders and rolled back checkouts.
///
/// Every release is attempted independently. A failure is logged, counted
/// and recorded; it never stops the remaining releases or undoes the
/// cancellation.
pub struct CompensationHandler<S> {
    orders: OrderService<S>,
    catalog: CatalogClient,
}

impl<S: Clone> Clone for CompensationHandler<S> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<S: EventStore> CompensationHandler<S> {
    pub fn new(store: S, catalog: CatalogClient) -> Self {
        Self {
            orders: OrderService::new(store),
            catalog,
        }
    }

    /// Cancels an order on behalf of its owner and releases its stock.
    ///
    /// The cancellation is stored before any stock moves, so an order that
    /// ships concurrently either refuses the cancel or is refused itself.
    /// Afterwards one release outcome per order line is recorded. A failure
    /// to record them is logged and leaves the order cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        owner_id: OwnerId,
        order_id: AggregateId,
        reason: &str,
    ) -> Result<Order> {
        let order = self.orders.get_order_for_owner(order_id, owner_id).await?;
        order.ensure_cancellable().map_err(DomainError::from)?;

        let order = self.orders.cancel_order(order_id, reason).await?;
        tracing::info!(%order_id, "order cancelled");

        let reservations: Vec<Reservation> = order
            .items()
            .iter()
            .map(|item| Reservation {
                reservation_id: item.reservation_id,
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                reserved_at: order.created_at().unwrap_or_default(),
            })
            .collect();

        let mut releases = Vec::with_capacity(reservations.len());
        for reservation in &reservations {
            releases.push(self.release_one(reservation).await);
        }

        let failed = releases.iter().filter(|r| !r.succeeded()).count();
        if failed > 0 {
            tracing::warn!(%order_id, failed, "order cancelled with unreleased stock");
        }

        match self.orders.record_stock_releases(order_id, releases).await {
            Ok(order) => Ok(order),
            Err(e) => {
                tracing::error!(%order_id, error = %e, "failed to record stock releases");
                Ok(order)
            }
        }
    }

    /// Releases reservations in reverse order of acquisition.
    pub async fn release_reservations(&self, reservations: &[Reservation]) -> Vec<StockRelease> {
        let mut releases = Vec::with_capacity(reservations.len());
        for reservation in reservations.iter().rev() {
            releases.push(self.release_one(reservation).await);
        }
        releases
    }

    async fn release_one(&self, reservation: &Reservation) -> StockRelease {
        let outcome = match self.catalog.release(reservation).await {
            Ok(()) => {
                metrics::counter!("stock_reservations_released_total").increment(1);
                ReleaseOutcome::Released
            }
            Err(e) => {
                metrics::counter!("stock_release_failures_total").increment(1);
                tracing::warn!(
                    reservation_id = %reservation.reservation_id,
                    product_id = %reservation.product_id,
                    error = %e,
                    "stock release failed"
                );
                ReleaseOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        StockRelease {
            reservation_id: reservation.reservation_id,
            product_id: reservation.product_id.clone(),
            quantity: reservation.quantity,
            outcome,
        }
    }
}
