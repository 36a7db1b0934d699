//! Shared application state.

use std::sync::Arc;

use checkout::{CartCoordinator, CatalogClient, CheckoutCoordinator, CheckoutSettings};
use domain::OrderService;
use event_store::EventStore;
use projections::{OrderDirectoryView, Projection, ProjectionProcessor};

use crate::error::ApiError;

/// Services and views shared by all handlers.
pub struct AppState<S: EventStore> {
    pub carts: CartCoordinator<S>,
    pub orders: OrderService<S>,
    pub checkout: CheckoutCoordinator<S>,
    pub directory: OrderDirectoryView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    pub fn new(store: S, catalog: CatalogClient, settings: CheckoutSettings) -> Self {
        let directory = OrderDirectoryView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(directory.clone()) as Box<dyn Projection>);

        Self {
            carts: CartCoordinator::new(store.clone(), catalog.clone()),
            orders: OrderService::new(store.clone()),
            checkout: CheckoutCoordinator::new(store, catalog, settings),
            directory,
            projection_processor: Arc::new(processor),
        }
    }

    /// Brings the order directory up to date with the event log.
    pub async fn refresh_directory(&self) -> Result<(), ApiError> {
        self.projection_processor.run_catch_up().await?;
        Ok(())
    }
}
