//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use domain::{Aggregate, Cart, ProductId};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{parse_item_id, parse_owner_id};
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub id: Option<String>,
    pub owner_id: String,
    pub items: Vec<CartItemResponse>,
    pub total_items: u32,
    pub total_amount_cents: i64,
    pub checkout_in_progress: bool,
    pub version: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub item_id: String,
    pub product_id: String,
    pub product_name: String,
    pub image_url: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct ItemCountResponse {
    pub count: u32,
}

impl CartResponse {
    fn from_cart(owner_id: String, cart: &Cart) -> Self {
        Self {
            id: cart.id().map(|id| id.to_string()),
            owner_id,
            items: cart
                .items()
                .iter()
                .map(|item| CartItemResponse {
                    item_id: item.item_id.to_string(),
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    image_url: item.image_url.clone(),
                    unit_price_cents: item.unit_price.cents(),
                    quantity: item.quantity,
                    line_total_cents: item.line_total().cents(),
                })
                .collect(),
            total_items: cart.total_items(),
            total_amount_cents: cart.total_amount().cents(),
            checkout_in_progress: cart.checkout_in_progress(),
            version: cart.version().as_i64(),
            updated_at: cart.updated_at(),
        }
    }
}

// -- Handlers --

/// GET /carts/{owner_id}: the owner's cart, created on first access.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let cart = state.carts.get_or_create_cart(owner).await?;
    Ok(Json(CartResponse::from_cart(owner_id, &cart)))
}

/// GET /carts/{owner_id}/count
#[tracing::instrument(skip(state))]
pub async fn count<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner_id): Path<String>,
) -> Result<Json<ItemCountResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let count = state.carts.item_count(owner).await?;
    Ok(Json(ItemCountResponse { count }))
}

/// POST /carts/{owner_id}/items: adds a catalog product.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    if req.product_id.trim().is_empty() {
        return Err(ApiError::BadRequest("product_id is required".to_string()));
    }
    let cart = state
        .carts
        .add_product(owner, &ProductId::new(req.product_id), req.quantity)
        .await?;
    Ok(Json(CartResponse::from_cart(owner_id, &cart)))
}

/// PUT /carts/{owner_id}/items/{item_id}
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((owner_id, item_id)): Path<(String, String)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let item_id = parse_item_id(&item_id)?;
    let cart = state
        .carts
        .update_quantity(owner, item_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::from_cart(owner_id, &cart)))
}

/// DELETE /carts/{owner_id}/items/{item_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((owner_id, item_id)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let item_id = parse_item_id(&item_id)?;
    let cart = state.carts.remove_item(owner, item_id).await?;
    Ok(Json(CartResponse::from_cart(owner_id, &cart)))
}

/// DELETE /carts/{owner_id}: empties the cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let cart = state.carts.clear_cart(owner).await?;
    Ok(Json(CartResponse::from_cart(owner_id, &cart)))
}
