use serde::{Deserialize, Serialize};

use crate::value_objects::{Money, ProductId, ProductSnapshot, ReservationId};

/// An order line, frozen when the order is committed.
///
/// Later catalog changes never reach an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    /// The stock reservation backing this line.
    pub reservation_id: ReservationId,
}

impl OrderItem {
    pub fn from_product(
        product: &ProductSnapshot,
        quantity: u32,
        reservation_id: ReservationId,
    ) -> Self {
        Self {
            product_id: product.product_id.clone(),
            product_name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            image_url: product.image_url.clone(),
            unit_price: product.unit_price,
            quantity,
            reservation_id,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price.checked_times(self.quantity)
    }
}

/// What happened when one order line's stock was handed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    Released,
    Failed { error: String },
}

/// Reconciliation record for one line of a cancelled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRelease {
    pub reservation_id: ReservationId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub outcome: ReleaseOutcome,
}

impl StockRelease {
    pub fn released(item: &OrderItem) -> Self {
        Self::for_item(item, ReleaseOutcome::Released)
    }

    pub fn failed(item: &OrderItem, error: impl Into<String>) -> Self {
        Self::for_item(
            item,
            ReleaseOutcome::Failed {
                error: error.into(),
            },
        )
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ReleaseOutcome::Released)
    }

    fn for_item(item: &OrderItem, outcome: ReleaseOutcome) -> Self {
        Self {
            reservation_id: item.reservation_id,
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            outcome,
        }
    }
}
