//! Read model views.

pub mod order_directory;

pub use order_directory::{OrderDirectoryView, OrderSummary, StatusCount};
