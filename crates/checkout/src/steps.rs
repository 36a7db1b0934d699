//! Checkout saga step names, as recorded in the journal.

/// Append `CheckoutStarted` to the cart at the validated version.
pub const STEP_CLAIM_CART: &str = "claim_cart";

/// Reserve stock for every cart line, in line order.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Freeze current catalog data for each reserved line.
pub const STEP_SNAPSHOT_ITEMS: &str = "snapshot_items";

pub const STEP_COMMIT_ORDER: &str = "commit_order";

/// Empty the cart and release the claim.
pub const STEP_CLEAR_CART: &str = "clear_cart";

/// Compensation: hand every reservation of the run back.
pub const STEP_RELEASE_STOCK: &str = "release_stock";

/// Compensation: release the cart claim, items untouched.
pub const STEP_RELEASE_CART: &str = "release_cart";

/// Compensation: cancel an order committed before a later step failed.
pub const STEP_CANCEL_ORDER: &str = "cancel_order";
