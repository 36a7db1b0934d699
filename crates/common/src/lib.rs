//! Shared types used across the checkout workspace.

mod types;

pub use types::AggregateId;
