//! Checkout coordinator: turns a cart into a committed order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    Aggregate, Cart, CartError, CartService, CommandHandler, DomainError, DomainEvent, Money,
    NewOrder, Order, OrderError, OrderItem, OrderNumber, OrderService, OwnerId, ReleaseOutcome,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::CheckoutSaga;
use crate::catalog::{CatalogClient, Reservation};
use crate::compensation::CompensationHandler;
use crate::error::{CheckoutError, Result};
use crate::events::SagaEvent;
use crate::steps;

pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_DELIVERY_LEAD_DAYS: i64 = 7;
pub const DEFAULT_ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// Upper bound for each of tax, shipping and discount.
pub const MAX_CHARGE: Money = Money::from_cents(100_000_000_000);

/// Tunables for checkout runs.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Upper bound for the reserve and snapshot steps together.
    pub checkout_timeout: Duration,
    /// Added to the commit time to estimate delivery.
    pub delivery_lead: chrono::Duration,
    /// Order numbers drawn before giving up on collisions.
    pub order_number_attempts: u32,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            checkout_timeout: DEFAULT_CHECKOUT_TIMEOUT,
            delivery_lead: chrono::Duration::days(DEFAULT_DELIVERY_LEAD_DAYS),
            order_number_attempts: DEFAULT_ORDER_NUMBER_ATTEMPTS,
        }
    }
}

/// What the buyer supplies at checkout. Items come from the cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    #[serde(default)]
    pub billing_address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub shipping_cost: Money,
    #[serde(default)]
    pub discount: Money,
}

impl CheckoutRequest {
    pub fn new(shipping_address: impl Into<String>) -> Self {
        Self {
            shipping_address: shipping_address.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, amount) in [
            ("tax", self.tax),
            ("shipping", self.shipping_cost),
            ("discount", self.discount),
        ] {
            if amount.is_negative() {
                return Err(CheckoutError::InvalidRequest(format!(
                    "{field} must not be negative"
                )));
            }
            if amount > MAX_CHARGE {
                return Err(CheckoutError::InvalidRequest(format!(
                    "{field} must not exceed {MAX_CHARGE}"
                )));
            }
        }
        if self.shipping_address.trim().is_empty() {
            return Err(CheckoutError::InvalidRequest(
                "shipping address is required".to_string(),
            ));
        }
        Ok(())
    }
}

type OrderNumberSource = Arc<dyn Fn(DateTime<Utc>) -> OrderNumber + Send + Sync>;

/// Runs checkouts.
///
/// Each run validates the cart against the catalog, claims the cart at the
/// validated version, reserves stock line by line, freezes current product
/// data, commits the order and empties the cart. Any failure after the claim
/// releases every reservation the run took and hands the cart back with its
/// items untouched. Every run is journalled as a [`CheckoutSaga`].
pub struct CheckoutCoordinator<S> {
    store: S,
    carts: CartService<S>,
    orders: OrderService<S>,
    sagas: CommandHandler<S, CheckoutSaga>,
    catalog: CatalogClient,
    compensation: CompensationHandler<S>,
    settings: CheckoutSettings,
    order_numbers: OrderNumberSource,
}

impl<S: Clone> Clone for CheckoutCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            carts: self.carts.clone(),
            orders: self.orders.clone(),
            sagas: self.sagas.clone(),
            catalog: self.catalog.clone(),
            compensation: self.compensation.clone(),
            settings: self.settings.clone(),
            order_numbers: Arc::clone(&self.order_numbers),
        }
    }
}

impl<S> CheckoutCoordinator<S>
where
    S: EventStore + Clone,
{
    pub fn new(store: S, catalog: CatalogClient, settings: CheckoutSettings) -> Self {
        Self {
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            sagas: CommandHandler::new(store.clone()),
            compensation: CompensationHandler::new(store.clone(), catalog.clone()),
            store,
            catalog,
            settings,
            order_numbers: Arc::new(OrderNumber::generate),
        }
    }

    /// Replaces the order number generator.
    pub fn with_order_numbers(
        mut self,
        source: impl Fn(DateTime<Utc>) -> OrderNumber + Send + Sync + 'static,
    ) -> Self {
        self.order_numbers = Arc::new(source);
        self
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    pub fn compensation(&self) -> &CompensationHandler<S> {
        &self.compensation
    }

    /// Checks out the owner's cart.
    ///
    /// Either the order is committed and the cart is empty, or no order was
    /// placed, every reservation this run took is released and the cart
    /// items are unchanged.
    #[tracing::instrument(skip(self, request))]
    pub async fn checkout(&self, owner_id: OwnerId, request: CheckoutRequest) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.run(owner_id, &request).await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);
        match &result {
            Ok(order) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_number = ?order.order_number(),
                    total = %order.final_amount(),
                    duration,
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %e, duration, "checkout failed");
            }
        }
        result
    }

    /// Loads the journal of a checkout run.
    pub async fn get_saga(&self, saga_id: AggregateId) -> Result<CheckoutSaga> {
        self.sagas
            .load_existing(saga_id)
            .await?
            .ok_or(CheckoutError::SagaNotFound(saga_id))
    }

    async fn run(&self, owner_id: OwnerId, request: &CheckoutRequest) -> Result<Order> {
        let cart = self.validate(owner_id, request).await?;

        let saga_id = AggregateId::new();
        let mut journal = Journal::new(&self.store, saga_id);
        journal
            .record(SagaEvent::saga_started(
                saga_id,
                owner_id,
                Cart::id_for(owner_id),
                cart.version(),
                cart.items().len(),
            ))
            .await?;
        tracing::info!(%saga_id, lines = cart.items().len(), "checkout started");

        journal
            .record(SagaEvent::step_started(steps::STEP_CLAIM_CART))
            .await?;
        if let Err(e) = self
            .carts
            .begin_checkout(owner_id, saga_id, cart.version())
            .await
        {
            let e = CheckoutError::from(e);
            journal
                .record_quietly(SagaEvent::step_failed(steps::STEP_CLAIM_CART, e.to_string()))
                .await;
            journal
                .record_quietly(SagaEvent::saga_failed(e.to_string()))
                .await;
            return Err(e);
        }

        match self.run_claimed(&mut journal, owner_id, &cart, request).await {
            Ok(order) => Ok(order),
            Err(e) => {
                self.roll_back(&mut journal, owner_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Nothing here has side effects.
    async fn validate(&self, owner_id: OwnerId, request: &CheckoutRequest) -> Result<Cart> {
        request.validate()?;

        let cart = self
            .carts
            .get_cart(owner_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(CheckoutError::EmptyCart)?;
        if let Some(saga_id) = cart.active_checkout() {
            return Err(DomainError::from(CartError::CheckoutInProgress { saga_id }).into());
        }

        let total = cart
            .items()
            .iter()
            .map(|item| item.checked_line_total())
            .chain([Some(request.tax), Some(request.shipping_cost)])
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount?))
            .and_then(|gross| gross.checked_sub(request.discount));
        if total.is_none() {
            return Err(CheckoutError::InvalidRequest(
                "order total exceeds the representable range".to_string(),
            ));
        }

        for item in cart.items() {
            if !self
                .catalog
                .is_available(&item.product_id, item.quantity)
                .await
            {
                return Err(CheckoutError::Unavailable {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                });
            }
        }
        Ok(cart)
    }

    async fn run_claimed(
        &self,
        journal: &mut Journal<'_, S>,
        owner_id: OwnerId,
        cart: &Cart,
        request: &CheckoutRequest,
    ) -> Result<Order> {
        journal
            .record(SagaEvent::step_completed(steps::STEP_CLAIM_CART))
            .await?;

        let limit = self.settings.checkout_timeout;
        let lines = match tokio::time::timeout(limit, self.reserve_and_snapshot(journal, cart)).await
        {
            Ok(lines) => lines?,
            Err(_) => {
                let step = journal
                    .saga
                    .current_step()
                    .unwrap_or(steps::STEP_RESERVE_STOCK)
                    .to_string();
                journal
                    .record_quietly(SagaEvent::step_failed(step, "timed out"))
                    .await;
                return Err(CheckoutError::TimedOut(limit));
            }
        };

        journal
            .record(SagaEvent::step_started(steps::STEP_COMMIT_ORDER))
            .await?;
        let (order_id, order) = match self.commit_order(owner_id, lines, request).await {
            Ok(committed) => committed,
            Err(e) => {
                journal
                    .record_quietly(SagaEvent::step_failed(steps::STEP_COMMIT_ORDER, e.to_string()))
                    .await;
                return Err(e);
            }
        };
        // A committed order is only undone when the cart cannot be cleared;
        // journal hiccups from here on are logged.
        journal.committed = Some(order_id);
        if let Some(order_number) = order.order_number() {
            journal
                .record_quietly(SagaEvent::order_committed(order_id, order_number.clone()))
                .await;
        }
        journal
            .record_quietly(SagaEvent::step_completed(steps::STEP_COMMIT_ORDER))
            .await;

        journal
            .record_quietly(SagaEvent::step_started(steps::STEP_CLEAR_CART))
            .await;
        if let Err(e) = self
            .carts
            .complete_checkout(owner_id, journal.saga_id, order_id)
            .await
        {
            let e = CheckoutError::from(e);
            journal
                .record_quietly(SagaEvent::step_failed(steps::STEP_CLEAR_CART, e.to_string()))
                .await;
            return Err(e);
        }

        journal
            .record_quietly(SagaEvent::step_completed(steps::STEP_CLEAR_CART))
            .await;
        journal
            .record_quietly(SagaEvent::saga_completed(order_id))
            .await;
        Ok(order)
    }

    async fn reserve_and_snapshot(
        &self,
        journal: &mut Journal<'_, S>,
        cart: &Cart,
    ) -> Result<Vec<OrderItem>> {
        journal
            .record(SagaEvent::step_started(steps::STEP_RESERVE_STOCK))
            .await?;
        for item in cart.items() {
            match self.catalog.reserve(&item.product_id, item.quantity).await {
                Ok(reservation) => journal.reserved(reservation).await?,
                Err(e) => {
                    journal
                        .record_quietly(SagaEvent::step_failed(
                            steps::STEP_RESERVE_STOCK,
                            e.to_string(),
                        ))
                        .await;
                    return Err(e.into());
                }
            }
        }
        journal
            .record(SagaEvent::step_completed(steps::STEP_RESERVE_STOCK))
            .await?;

        journal
            .record(SagaEvent::step_started(steps::STEP_SNAPSHOT_ITEMS))
            .await?;
        let reservations = journal.reservations.clone();
        let mut lines = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            match self.catalog.fetch_product(&reservation.product_id).await {
                Ok(product) => lines.push(OrderItem::from_product(
                    &product,
                    reservation.quantity,
                    reservation.reservation_id,
                )),
                Err(e) => {
                    journal
                        .record_quietly(SagaEvent::step_failed(
                            steps::STEP_SNAPSHOT_ITEMS,
                            e.to_string(),
                        ))
                        .await;
                    return Err(e.into());
                }
            }
        }
        journal
            .record(SagaEvent::step_completed(steps::STEP_SNAPSHOT_ITEMS))
            .await?;

        Ok(lines)
    }

    /// Places the order, drawing a new number whenever the drawn one exists.
    async fn commit_order(
        &self,
        owner_id: OwnerId,
        lines: Vec<OrderItem>,
        request: &CheckoutRequest,
    ) -> Result<(AggregateId, Order)> {
        let attempts = self.settings.order_number_attempts.max(1);
        for attempt in 1..=attempts {
            let now = Utc::now();
            let order_number = (self.order_numbers)(now);
            let new = NewOrder {
                order_number: order_number.clone(),
                owner_id,
                items: lines.clone(),
                tax: request.tax,
                shipping_cost: request.shipping_cost,
                discount: request.discount,
                shipping_address: request.shipping_address.clone(),
                billing_address: request.billing_address.clone(),
                phone: request.phone.clone(),
                email: request.email.clone(),
                notes: request.notes.clone(),
                payment_method: request.payment_method.clone(),
                coupon_code: request.coupon_code.clone(),
                estimated_delivery: Some(now + self.settings.delivery_lead),
            };

            match self.orders.place_order(new).await {
                Ok(order) => return Ok((Order::id_for(&order_number), order)),
                Err(DomainError::Order(OrderError::AlreadyExists { .. })) => {
                    tracing::warn!(%order_number, attempt, "order number taken, drawing again");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CheckoutError::OrderNumberExhausted { attempts })
    }

    /// Undoes a run that failed after claiming the cart.
    ///
    /// Never fails: every compensation step is attempted and its outcome
    /// journalled.
    async fn roll_back(&self, journal: &mut Journal<'_, S>, owner_id: OwnerId, reason: &str) {
        let from_step = journal
            .saga
            .current_step()
            .unwrap_or(steps::STEP_CLAIM_CART)
            .to_string();
        journal
            .record_quietly(SagaEvent::compensation_started(from_step))
            .await;

        let mut stock_released = false;
        if let Some(order_id) = journal.committed {
            // Cancelling the order releases the stock of each of its lines.
            match self
                .compensation
                .cancel_order(owner_id, order_id, "checkout rolled back")
                .await
            {
                Ok(_) => {
                    stock_released = true;
                    journal
                        .record_quietly(SagaEvent::compensation_step_completed(
                            steps::STEP_CANCEL_ORDER,
                        ))
                        .await;
                }
                Err(e) => {
                    tracing::error!(%order_id, error = %e, "failed to cancel order during rollback");
                    journal
                        .record_quietly(SagaEvent::compensation_step_failed(
                            steps::STEP_CANCEL_ORDER,
                            e.to_string(),
                        ))
                        .await;
                }
            }
        }

        if !stock_released && !journal.reservations.is_empty() {
            let releases = self
                .compensation
                .release_reservations(&journal.reservations)
                .await;
            let failures: Vec<String> = releases
                .iter()
                .filter_map(|release| match &release.outcome {
                    ReleaseOutcome::Released => None,
                    ReleaseOutcome::Failed { error } => {
                        Some(format!("{}: {error}", release.reservation_id))
                    }
                })
                .collect();
            let event = if failures.is_empty() {
                SagaEvent::compensation_step_completed(steps::STEP_RELEASE_STOCK)
            } else {
                SagaEvent::compensation_step_failed(steps::STEP_RELEASE_STOCK, failures.join("; "))
            };
            journal.record_quietly(event).await;
        }

        let saga_id = journal.saga_id;
        match self.carts.abort_checkout(owner_id, saga_id, reason).await {
            Ok(_) => {
                journal
                    .record_quietly(SagaEvent::compensation_step_completed(
                        steps::STEP_RELEASE_CART,
                    ))
                    .await;
            }
            Err(e) => {
                tracing::error!(%saga_id, error = %e, "failed to release cart claim");
                journal
                    .record_quietly(SagaEvent::compensation_step_failed(
                        steps::STEP_RELEASE_CART,
                        e.to_string(),
                    ))
                    .await;
            }
        }

        journal.record_quietly(SagaEvent::saga_failed(reason)).await;
    }
}

/// Appends saga events for one run and keeps the in-memory copy current.
struct Journal<'a, S> {
    store: &'a S,
    saga_id: AggregateId,
    saga: CheckoutSaga,
    /// Every reservation taken, kept even if journalling it failed.
    reservations: Vec<Reservation>,
    committed: Option<AggregateId>,
}

impl<'a, S: EventStore> Journal<'a, S> {
    fn new(store: &'a S, saga_id: AggregateId) -> Self {
        Self {
            store,
            saga_id,
            saga: CheckoutSaga::default(),
            reservations: Vec::new(),
            committed: None,
        }
    }

    async fn record(&mut self, event: SagaEvent) -> Result<()> {
        let current = self.saga.version();
        let envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(self.saga_id)
            .aggregate_type(CheckoutSaga::aggregate_type())
            .version(current.next())
            .payload(&event)?
            .build()?;

        let options = if current == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current)
        };
        let new_version = self.store.append(vec![envelope], options).await?;

        self.saga.apply(event);
        self.saga.set_version(new_version);
        Ok(())
    }

    async fn record_quietly(&mut self, event: SagaEvent) {
        if let Err(e) = self.record(event).await {
            tracing::warn!(saga_id = %self.saga_id, error = %e, "failed to journal checkout event");
        }
    }

    async fn reserved(&mut self, reservation: Reservation) -> Result<()> {
        self.reservations.push(reservation.clone());
        self.record(SagaEvent::StockReserved(reservation)).await
    }
}
