//! Checkout, order lookup and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::CheckoutRequest;
use domain::{Aggregate, Money, Order, OrderNumber, ReleaseOutcome};
use event_store::EventStore;
use projections::OrderSummary;
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_owner_id};
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutBody {
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
    pub tax_cents: i64,
    #[serde(default)]
    pub shipping_cost_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        CheckoutRequest {
            shipping_address: body.shipping_address,
            billing_address: body.billing_address,
            phone: body.phone,
            email: body.email,
            notes: body.notes,
            payment_method: body.payment_method,
            coupon_code: body.coupon_code,
            tax: Money::from_cents(body.tax_cents),
            shipping_cost: Money::from_cents(body.shipping_cost_cents),
            discount: Money::from_cents(body.discount_cents),
        }
    }
}

#[derive(Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: Option<String>,
    pub order_number: Option<String>,
    pub owner_id: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub total_items: u32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cost_cents: i64,
    pub discount_cents: i64,
    pub final_amount_cents: i64,
    pub fulfillment_status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub coupon_code: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub stock_releases: Vec<StockReleaseResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
    pub reservation_id: String,
}

#[derive(Serialize)]
pub struct StockReleaseResponse {
    pub reservation_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub released: bool,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub order_number: String,
    pub fulfillment_status: String,
    pub payment_status: String,
    pub total_items: u32,
    pub final_amount_cents: i64,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()),
            order_number: order.order_number().map(ToString::to_string),
            owner_id: order.owner_id().map(|o| o.to_string()),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    description: item.description.clone(),
                    category: item.category.clone(),
                    image_url: item.image_url.clone(),
                    unit_price_cents: item.unit_price.cents(),
                    quantity: item.quantity,
                    line_total_cents: item.line_total().cents(),
                    reservation_id: item.reservation_id.to_string(),
                })
                .collect(),
            total_items: order.total_items(),
            subtotal_cents: order.subtotal().cents(),
            tax_cents: order.tax().cents(),
            shipping_cost_cents: order.shipping_cost().cents(),
            discount_cents: order.discount().cents(),
            final_amount_cents: order.final_amount().cents(),
            fulfillment_status: order.fulfillment_status().to_string(),
            payment_status: order.payment_status().to_string(),
            shipping_address: order.shipping_address().to_string(),
            billing_address: order.billing_address().to_string(),
            phone: order.phone().map(String::from),
            email: order.email().map(String::from),
            notes: order.notes().map(String::from),
            payment_method: order.payment_method().map(String::from),
            transaction_id: order.transaction_id().map(String::from),
            coupon_code: order.coupon_code().map(String::from),
            estimated_delivery: order.estimated_delivery(),
            actual_delivery: order.actual_delivery(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            cancellation_reason: order.cancellation_reason().map(String::from),
            stock_releases: order
                .stock_releases()
                .iter()
                .map(|release| StockReleaseResponse {
                    reservation_id: release.reservation_id.to_string(),
                    product_id: release.product_id.to_string(),
                    quantity: release.quantity,
                    released: release.succeeded(),
                    error: match &release.outcome {
                        ReleaseOutcome::Released => None,
                        ReleaseOutcome::Failed { error } => Some(error.clone()),
                    },
                })
                .collect(),
        }
    }
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(summary: OrderSummary) -> Self {
        Self {
            id: summary.order_id.to_string(),
            order_number: summary.order_number.to_string(),
            fulfillment_status: summary.fulfillment_status.to_string(),
            payment_status: summary.payment_status.to_string(),
            total_items: summary.total_items,
            final_amount_cents: summary.final_amount.cents(),
            placed_at: summary.placed_at,
            updated_at: summary.updated_at,
        }
    }
}

// -- Handlers --

/// POST /owners/{owner_id}/orders: checks out the owner's cart.
#[tracing::instrument(skip(state, body))]
pub async fn checkout<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner_id): Path<String>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let order = state.checkout.checkout(owner, body.into()).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /owners/{owner_id}/orders: the owner's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    state.refresh_directory().await?;

    let orders = state.directory.orders_for_owner(owner).await;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /owners/{owner_id}/orders/{order_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((owner_id, order_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let order_id = parse_aggregate_id(&order_id)?;
    let order = state.orders.get_order_for_owner(order_id, owner).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /owners/{owner_id}/orders/number/{order_number}
#[tracing::instrument(skip(state))]
pub async fn get_by_number<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((owner_id, order_number)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let order = state
        .orders
        .get_order_by_number_for_owner(&OrderNumber::from(order_number), owner)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /owners/{owner_id}/orders/{order_id}/cancel: cancels the order and
/// hands its stock back.
#[tracing::instrument(skip(state, body))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((owner_id, order_id)): Path<(String, String)>,
    Json(body): Json<CancelBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let owner = parse_owner_id(&owner_id)?;
    let order_id = parse_aggregate_id(&order_id)?;
    let reason = body
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Cancelled by customer".to_string());

    let order = state
        .checkout
        .compensation()
        .cancel_order(owner, order_id, &reason)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
