//! Catalog-aware cart operations.

use domain::cart::{MAX_QUANTITY, MIN_QUANTITY};
use domain::{Cart, CartError, CartItemId, CartService, DomainError, OwnerId, ProductId};
use event_store::EventStore;

use crate::catalog::{CatalogClient, CatalogError};
use crate::error::{CheckoutError, Result};

/// Cart operations that consult the catalog before touching the cart.
///
/// Added products are looked up for their current name, price and image,
/// and every quantity change is checked against the catalog's availability
/// for the resulting line quantity.
pub struct CartCoordinator<S> {
    carts: CartService<S>,
    catalog: CatalogClient,
}

impl<S: Clone> Clone for CartCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            carts: self.carts.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<S: EventStore> CartCoordinator<S> {
    pub fn new(store: S, catalog: CatalogClient) -> Self {
        Self {
            carts: CartService::new(store),
            catalog,
        }
    }

    pub async fn get_or_create_cart(&self, owner_id: OwnerId) -> Result<Cart> {
        Ok(self.carts.get_or_create(owner_id).await?)
    }

    /// Adds `quantity` of a catalog product to the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(
        &self,
        owner_id: OwnerId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        check_quantity(quantity)?;

        let product = self
            .catalog
            .product(product_id)
            .await
            .ok_or_else(|| CatalogError::NotFound(product_id.clone()))?;

        let in_cart = self
            .carts
            .get_cart(owner_id)
            .await?
            .and_then(|cart| {
                cart.items()
                    .iter()
                    .find(|i| &i.product_id == product_id)
                    .map(|i| i.quantity)
            })
            .unwrap_or(0);
        self.ensure_available(product_id, in_cart + quantity).await?;

        Ok(self.carts.add_item(owner_id, &product, quantity).await?)
    }

    /// Sets a line's quantity after re-checking availability for it.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner_id: OwnerId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart> {
        check_quantity(quantity)?;

        let cart = self.carts.get_cart(owner_id).await?;
        let product_id = cart
            .as_ref()
            .and_then(|cart| cart.item(item_id))
            .map(|item| item.product_id.clone())
            .ok_or(DomainError::Cart(CartError::ItemNotFound { item_id }))?;
        self.ensure_available(&product_id, quantity).await?;

        Ok(self
            .carts
            .update_item_quantity(owner_id, item_id, quantity)
            .await?)
    }

    pub async fn remove_item(&self, owner_id: OwnerId, item_id: CartItemId) -> Result<Cart> {
        if self.carts.get_cart(owner_id).await?.is_none() {
            return Err(DomainError::Cart(CartError::ItemNotFound { item_id }).into());
        }
        Ok(self.carts.remove_item(owner_id, item_id).await?)
    }

    /// Empties the cart. The cart itself is kept.
    pub async fn clear_cart(&self, owner_id: OwnerId) -> Result<Cart> {
        let cart = self.carts.get_or_create(owner_id).await?;
        if cart.is_empty() {
            return Ok(cart);
        }
        Ok(self.carts.clear(owner_id).await?)
    }

    /// Total quantity across all lines, zero if the owner has no cart.
    pub async fn item_count(&self, owner_id: OwnerId) -> Result<u32> {
        Ok(self
            .carts
            .get_cart(owner_id)
            .await?
            .map_or(0, |cart| cart.total_items()))
    }

    async fn ensure_available(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        if !self.catalog.is_available(product_id, quantity).await {
            return Err(CheckoutError::Unavailable {
                product_id: product_id.clone(),
                quantity,
            });
        }
        Ok(())
    }
}

fn check_quantity(quantity: u32) -> Result<()> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(DomainError::Cart(CartError::InvalidQuantity { quantity }).into());
    }
    Ok(())
}
