//! Checkout saga inspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use checkout::CheckoutSaga;
use event_store::EventStore;
use serde::Serialize;

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SagaResponse {
    pub saga_id: String,
    pub state: &'static str,
    pub owner_id: Option<String>,
    pub cart_id: Option<String>,
    pub current_step: Option<String>,
    pub completed_steps: Vec<String>,
    pub reservations: usize,
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub failure_reason: Option<String>,
    pub compensation_failures: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SagaResponse {
    fn from_saga(saga_id: String, saga: &CheckoutSaga) -> Self {
        Self {
            saga_id,
            state: saga.state().as_str(),
            owner_id: saga.owner_id().map(|o| o.to_string()),
            cart_id: saga.cart_id().map(|id| id.to_string()),
            current_step: saga.current_step().map(String::from),
            completed_steps: saga.completed_steps().to_vec(),
            reservations: saga.reservations().len(),
            order_id: saga.order_id().map(|id| id.to_string()),
            order_number: saga.order_number().map(ToString::to_string),
            failure_reason: saga.failure_reason().map(String::from),
            compensation_failures: saga.compensation_failures().to_vec(),
            started_at: saga.started_at(),
            finished_at: saga.finished_at(),
        }
    }
}

/// GET /checkouts/{saga_id}: the journal state of one checkout.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(saga_id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError> {
    let id = parse_aggregate_id(&saga_id)?;
    let saga = state.checkout.get_saga(id).await?;
    Ok(Json(SagaResponse::from_saga(saga_id, &saga)))
}
