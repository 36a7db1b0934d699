//! Read side of the cart and order system.
//!
//! This crate provides:
//! - [`Projection`] trait for turning events into read models
//! - [`ProjectionProcessor`], which replays the store's log into projections
//! - [`OrderDirectoryView`]: order-number lookup, per-owner listing and
//!   fulfillment status counts

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use views::{OrderDirectoryView, OrderSummary, StatusCount};
