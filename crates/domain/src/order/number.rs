use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Human-facing order number, `ORD-<unix millis>-<3 digit suffix>`.
///
/// Numbers drawn in the same millisecond collide one time in a thousand;
/// the order's aggregate id is derived from the number, so a collision
/// surfaces as an existing stream and the caller draws again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().as_u128() % 1000;
        Self::from_parts(now, suffix as u16)
    }

    pub fn from_parts(now: DateTime<Utc>, suffix: u16) -> Self {
        Self(format!("ORD-{}-{:03}", now.timestamp_millis(), suffix % 1000))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
