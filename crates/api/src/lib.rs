//! HTTP storefront over the cart, order and checkout services.
//!
//! Every route is generic over the event store, so the same router serves
//! the in-memory store in tests and PostgreSQL in production. Requests are
//! traced with `tower-http` and counters are exposed at `/metrics`.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use error::ApiError;
pub use state::AppState;

/// Builds the router with every route, CORS and request tracing.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Carts
        .route(
            "/carts/{owner_id}",
            get(routes::carts::get::<S>).delete(routes::carts::clear::<S>),
        )
        .route("/carts/{owner_id}/count", get(routes::carts::count::<S>))
        .route("/carts/{owner_id}/items", post(routes::carts::add_item::<S>))
        .route(
            "/carts/{owner_id}/items/{item_id}",
            put(routes::carts::update_item::<S>).delete(routes::carts::remove_item::<S>),
        )
        // Orders
        .route(
            "/owners/{owner_id}/orders",
            post(routes::orders::checkout::<S>).get(routes::orders::list::<S>),
        )
        .route(
            "/owners/{owner_id}/orders/{order_id}",
            get(routes::orders::get::<S>),
        )
        .route(
            "/owners/{owner_id}/orders/number/{order_number}",
            get(routes::orders::get_by_number::<S>),
        )
        .route(
            "/owners/{owner_id}/orders/{order_id}/cancel",
            post(routes::orders::cancel::<S>),
        )
        // Checkouts
        .route("/checkouts/{saga_id}", get(routes::checkouts::get::<S>))
        // Admin
        .route(
            "/admin/orders/statistics",
            get(routes::admin::statistics::<S>),
        )
        .route("/admin/orders/{order_id}", get(routes::admin::get::<S>))
        .route(
            "/admin/orders/{order_id}/status",
            patch(routes::admin::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
