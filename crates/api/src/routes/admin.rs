//! Back-office endpoints: order lookup, status transitions and statistics.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::StatusUpdate;
use event_store::EventStore;
use serde::Serialize;

use super::orders::OrderResponse;
use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub total_orders: usize,
    pub status_counts: Vec<StatusCountResponse>,
}

#[derive(Serialize)]
pub struct StatusCountResponse {
    pub status: String,
    pub count: usize,
}

/// GET /admin/orders/{order_id}
///
/// Any order, whoever owns it.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    let order = state.orders.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /admin/orders/{order_id}/status
#[tracing::instrument(skip(state))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    let order = state.orders.update_status(order_id, update).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /admin/orders/statistics
#[tracing::instrument(skip(state))]
pub async fn statistics<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    state.refresh_directory().await?;

    let counts = state.directory.status_counts().await;
    Ok(Json(StatisticsResponse {
        total_orders: counts.iter().map(|c| c.count).sum(),
        status_counts: counts
            .into_iter()
            .map(|c| StatusCountResponse {
                status: c.status.to_string(),
                count: c.count,
            })
            .collect(),
    }))
}
