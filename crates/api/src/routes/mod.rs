//! HTTP route handlers.

pub mod admin;
pub mod carts;
pub mod checkouts;
pub mod health;
pub mod metrics;
pub mod orders;

use common::AggregateId;
use domain::{CartItemId, OwnerId};
use uuid::Uuid;

use crate::error::ApiError;

fn parse_uuid(what: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}

pub(crate) fn parse_owner_id(raw: &str) -> Result<OwnerId, ApiError> {
    parse_uuid("owner id", raw).map(OwnerId::from_uuid)
}

pub(crate) fn parse_aggregate_id(raw: &str) -> Result<AggregateId, ApiError> {
    parse_uuid("id", raw).map(AggregateId::from)
}

pub(crate) fn parse_item_id(raw: &str) -> Result<CartItemId, ApiError> {
    parse_uuid("item id", raw).map(CartItemId::from_uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_owner_id("nope").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(parse_item_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
