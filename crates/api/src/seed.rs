//! Catalog seeding from a JSON product list.

use std::path::Path;

use checkout::InMemoryCatalog;
use domain::{Money, ProductSnapshot};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read catalog seed {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid catalog seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid catalog seed entry {product_id}: {reason}")]
    Invalid { product_id: String, reason: String },
}

/// One product entry in a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl TryFrom<SeedProduct> for ProductSnapshot {
    type Error = SeedError;

    fn try_from(seed: SeedProduct) -> Result<Self, Self::Error> {
        if seed.product_id.trim().is_empty() {
            return Err(SeedError::Invalid {
                product_id: seed.product_id,
                reason: "product_id is blank".to_string(),
            });
        }
        if seed.unit_price_cents < 0 {
            return Err(SeedError::Invalid {
                product_id: seed.product_id,
                reason: "unit price is negative".to_string(),
            });
        }

        let mut product = ProductSnapshot::new(
            seed.product_id,
            seed.name,
            Money::from_cents(seed.unit_price_cents),
        )
        .with_stock(seed.stock);
        product.description = seed.description;
        product.category = seed.category;
        product.image_url = seed.image_url;
        product.active = seed.active;
        Ok(product)
    }
}

/// Parses a JSON array of products into the catalog, returning how many
/// were loaded.
pub fn load_from_str(catalog: &InMemoryCatalog, json: &str) -> Result<usize, SeedError> {
    let seeds: Vec<SeedProduct> = serde_json::from_str(json)?;
    let products = seeds
        .into_iter()
        .map(ProductSnapshot::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let loaded = products.len();
    for product in products {
        catalog.upsert_product(product);
    }
    Ok(loaded)
}

pub fn load_from_file(catalog: &InMemoryCatalog, path: impl AsRef<Path>) -> Result<usize, SeedError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.display().to_string(),
        source,
    })?;
    load_from_str(catalog, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ProductId;

    #[test]
    fn loads_products_with_defaults() {
        let catalog = InMemoryCatalog::new();
        let json = r#"[
            {"product_id": "SKU-LAMP", "name": "Desk lamp", "unit_price_cents": 3999, "stock": 4},
            {"product_id": "SKU-OLD", "name": "Retired", "unit_price_cents": 100, "active": false}
        ]"#;

        assert_eq!(load_from_str(&catalog, json).unwrap(), 2);
        assert_eq!(catalog.stock(&ProductId::new("SKU-LAMP")), Some(4));
        assert_eq!(catalog.stock(&ProductId::new("SKU-OLD")), Some(0));
    }

    #[test]
    fn rejects_negative_prices_without_loading_anything() {
        let catalog = InMemoryCatalog::new();
        let json = r#"[
            {"product_id": "SKU-A", "name": "A", "unit_price_cents": 100, "stock": 1},
            {"product_id": "SKU-B", "name": "B", "unit_price_cents": -5}
        ]"#;

        let err = load_from_str(&catalog, json).unwrap_err();
        assert!(matches!(err, SeedError::Invalid { ref product_id, .. } if product_id == "SKU-B"));
        assert_eq!(catalog.stock(&ProductId::new("SKU-A")), None);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let catalog = InMemoryCatalog::new();
        assert!(matches!(
            load_from_str(&catalog, "{not json"),
            Err(SeedError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let catalog = InMemoryCatalog::new();
        let err = load_from_file(&catalog, "/nonexistent/catalog.json").unwrap_err();
        assert!(matches!(err, SeedError::Read { .. }));
    }
}
