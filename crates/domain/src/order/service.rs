//! Order service providing a simplified API for order operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::value_objects::OwnerId;

use super::{NewOrder, Order, OrderError, OrderNumber, StatusUpdate, StockRelease};

/// Service for managing orders.
///
/// Placement is driven by the checkout. Cancellation is stored here first;
/// the checkout side then hands the stock back and records how that went.
pub struct OrderService<S> {
    handler: CommandHandler<S, Order>,
}

impl<S: Clone> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Commits a new order.
    ///
    /// An existing stream for the order number fails with
    /// [`OrderError::AlreadyExists`] so the caller can draw a new number.
    #[tracing::instrument(skip(self, new), fields(order_number = %new.order_number))]
    pub async fn place_order(&self, new: NewOrder) -> Result<Order, DomainError> {
        let order_id = Order::id_for(&new.order_number);
        let order_number = new.order_number.clone();

        match self
            .handler
            .execute(order_id, |order| order.place(new))
            .await
        {
            Ok(result) => {
                tracing::info!(%order_id, "order placed");
                Ok(result.aggregate)
            }
            // Lost the race for the same number.
            Err(DomainError::EventStore(e)) if e.is_conflict() => {
                Err(OrderError::AlreadyExists { order_number }.into())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.handler
            .load_existing(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Loads an order, reporting a foreign order as not found.
    pub async fn get_order_for_owner(
        &self,
        order_id: AggregateId,
        owner_id: OwnerId,
    ) -> Result<Order, DomainError> {
        let order = self.get_order(order_id).await?;
        if order.owner_id() != Some(owner_id) {
            return Err(DomainError::not_found("Order", order_id));
        }
        Ok(order)
    }

    pub async fn get_order_by_number(&self, order_number: &OrderNumber) -> Result<Order, DomainError> {
        self.handler
            .load_existing(Order::id_for(order_number))
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_number))
    }

    pub async fn get_order_by_number_for_owner(
        &self,
        order_number: &OrderNumber,
        owner_id: OwnerId,
    ) -> Result<Order, DomainError> {
        let order = self.get_order_by_number(order_number).await?;
        if order.owner_id() != Some(owner_id) {
            return Err(DomainError::not_found("Order", order_number));
        }
        Ok(order)
    }

    /// Applies a partial status update.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: AggregateId,
        update: StatusUpdate,
    ) -> Result<Order, DomainError> {
        self.get_order(order_id).await?;
        let result = self
            .handler
            .execute_with_snapshot(order_id, |order| order.update_status(update))
            .await?;
        Ok(result.aggregate)
    }

    /// Cancels the order.
    ///
    /// The decision is taken against the stored version and appended at that
    /// version, so a concurrent status change makes one of the two fail.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: AggregateId,
        reason: &str,
    ) -> Result<Order, DomainError> {
        self.get_order(order_id).await?;
        let result = self
            .handler
            .execute_with_snapshot(order_id, |order| order.cancel(reason))
            .await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        Ok(result.aggregate)
    }

    /// Records the per-line stock release outcomes of a cancelled order.
    #[tracing::instrument(skip(self, releases), fields(lines = releases.len()))]
    pub async fn record_stock_releases(
        &self,
        order_id: AggregateId,
        releases: Vec<StockRelease>,
    ) -> Result<Order, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(order_id, |order| order.record_releases(releases))
            .await?;
        Ok(result.aggregate)
    }
}
