//! Inputs to order commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Money, OwnerId};

use super::{FulfillmentStatus, OrderItem, OrderNumber, PaymentStatus};

/// Everything needed to commit a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub owner_id: OwnerId,
    pub items: Vec<OrderItem>,
    pub tax: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub shipping_address: String,
    /// Falls back to the shipping address.
    pub billing_address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub coupon_code: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Partial status update; only the supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub fulfillment: Option<FulfillmentStatus>,
    #[serde(default)]
    pub payment: Option<PaymentStatus>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StatusUpdate {
    pub fn fulfillment(status: FulfillmentStatus) -> Self {
        Self {
            fulfillment: Some(status),
            ..Self::default()
        }
    }

    pub fn payment(status: PaymentStatus) -> Self {
        Self {
            payment: Some(status),
            ..Self::default()
        }
    }
}
