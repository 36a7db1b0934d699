//! Order status axes and their transition tables.
//!
//! Each status lists the statuses it may be entered from. Every transition
//! check goes through `can_transition_to`, so the tables below are the only
//! place the lifecycle is defined.
//!
//! ```text
//! Fulfillment:
//!   Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
//!      │            │             │
//!      └────────────┴─────────────┴──► Cancelled
//!
//! Payment:
//!   Pending ──► Processing ──► Completed ──► PartiallyRefunded ──► Refunded
//!      │            │              └─────────────────────────────────▲
//!      │            └──► Failed
//!      ├──► Failed
//!      └──► Completed
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl FulfillmentStatus {
    pub const ALL: [FulfillmentStatus; 6] = [
        FulfillmentStatus::Pending,
        FulfillmentStatus::Confirmed,
        FulfillmentStatus::Processing,
        FulfillmentStatus::Shipped,
        FulfillmentStatus::Delivered,
        FulfillmentStatus::Cancelled,
    ];

    /// Statuses this one may be entered from.
    pub fn allowed_predecessors(&self) -> &'static [FulfillmentStatus] {
        use FulfillmentStatus::*;
        match self {
            Pending => &[],
            Confirmed => &[Pending],
            Processing => &[Confirmed],
            Shipped => &[Processing],
            Delivered => &[Shipped],
            Cancelled => &[Pending, Confirmed, Processing],
        }
    }

    pub fn can_transition_to(&self, next: FulfillmentStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.can_transition_to(FulfillmentStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        Self::ALL.iter().all(|next| !self.can_transition_to(*next))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "PENDING",
            FulfillmentStatus::Confirmed => "CONFIRMED",
            FulfillmentStatus::Processing => "PROCESSING",
            FulfillmentStatus::Shipped => "SHIPPED",
            FulfillmentStatus::Delivered => "DELIVERED",
            FulfillmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown order status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
    ];

    /// Statuses this one may be entered from.
    pub fn allowed_predecessors(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Pending => &[],
            Processing => &[Pending],
            Completed => &[Pending, Processing],
            Failed => &[Pending, Processing],
            PartiallyRefunded => &[Completed, PartiallyRefunded],
            Refunded => &[Completed, PartiallyRefunded],
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        Self::ALL.iter().all(|next| !self.can_transition_to(*next))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown payment status '{s}'"))
    }
}

/// A recorded move on one status axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<T> {
    pub from: T,
    pub to: T,
}
