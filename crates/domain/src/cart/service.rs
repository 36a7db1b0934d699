//! Cart service over the event store.

use common::AggregateId;
use event_store::{EventStore, Version};

use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::value_objects::{OwnerId, ProductSnapshot};

use super::{Cart, CartError, CartItemId};

/// Loads and mutates carts by owner.
///
/// Catalog checks are not done here; callers pass in the product data the
/// catalog returned.
pub struct CartService<S> {
    handler: CommandHandler<S, Cart>,
}

impl<S: Clone> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

impl<S: EventStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns the owner's cart, or `None` if nothing was ever added.
    pub async fn get_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>, DomainError> {
        self.handler.load_existing(Cart::id_for(owner_id)).await
    }

    /// Returns the owner's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create(&self, owner_id: OwnerId) -> Result<Cart, DomainError> {
        let cart_id = Cart::id_for(owner_id);
        if let Some(cart) = self.handler.load_existing(cart_id).await? {
            return Ok(cart);
        }

        match self.handler.execute(cart_id, |cart| cart.open(owner_id)).await {
            Ok(result) => Ok(result.aggregate),
            // Another request created it first.
            Err(DomainError::Cart(CartError::AlreadyCreated)) => self.handler.load(cart_id).await,
            Err(DomainError::EventStore(e)) if e.is_conflict() => self.handler.load(cart_id).await,
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self, product), fields(product_id = %product.product_id))]
    pub async fn add_item(
        &self,
        owner_id: OwnerId,
        product: &ProductSnapshot,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(owner_id), |cart| {
                cart.add_item(owner_id, product, quantity)
            })
            .await?;
        record_mutation("add_item");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        owner_id: OwnerId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(owner_id), |cart| {
                cart.update_item_quantity(item_id, quantity)
            })
            .await?;
        record_mutation("update_quantity");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        owner_id: OwnerId,
        item_id: CartItemId,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(owner_id), |cart| cart.remove_item(item_id))
            .await?;
        record_mutation("remove_item");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner_id: OwnerId) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(owner_id), |cart| cart.clear())
            .await?;
        record_mutation("clear");
        Ok(result.aggregate)
    }

    /// Claims the cart for a checkout.
    ///
    /// Fails with a conflict if the cart moved past `validated_version` or
    /// another checkout holds it, including when the race is only detected
    /// by the store's version check.
    #[tracing::instrument(skip(self))]
    pub async fn begin_checkout(
        &self,
        owner_id: OwnerId,
        saga_id: AggregateId,
        validated_version: Version,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(owner_id), |cart| {
                cart.begin_checkout(saga_id, validated_version)
            })
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_checkout(
        &self,
        owner_id: OwnerId,
        saga_id: AggregateId,
        order_id: AggregateId,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(owner_id), |cart| {
                cart.complete_checkout(saga_id, order_id)
            })
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn abort_checkout(
        &self,
        owner_id: OwnerId,
        saga_id: AggregateId,
        reason: &str,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute_with_snapshot(Cart::id_for(owner_id), |cart| {
                cart.abort_checkout(saga_id, reason)
            })
            .await?;
        Ok(result.aggregate)
    }
}

fn record_mutation(operation: &'static str) {
    metrics::counter!("cart_mutations_total", "operation" => operation).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::error::ErrorKind;
    use crate::value_objects::Money;
    use event_store::InMemoryEventStore;

    fn service() -> CartService<InMemoryEventStore> {
        CartService::new(InMemoryEventStore::new())
    }

    fn widget() -> ProductSnapshot {
        ProductSnapshot::new("SKU-W", "Widget", Money::from_cents(1500)).with_stock(10)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let service = service();
        let owner = OwnerId::new();

        assert!(service.get_cart(owner).await.unwrap().is_none());

        let first = service.get_or_create(owner).await.unwrap();
        let second = service.get_or_create(owner).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(second.version(), Version::first());
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn concurrent_first_access_creates_one_cart() {
        let service = service();
        let owner = OwnerId::new();

        let (a, b) = tokio::join!(service.get_or_create(owner), service.get_or_create(owner));
        assert_eq!(a.unwrap().id(), b.unwrap().id());
    }

    #[tokio::test]
    async fn add_update_remove_roundtrip_through_store() {
        let service = service();
        let owner = OwnerId::new();

        let cart = service.add_item(owner, &widget(), 2).await.unwrap();
        let item_id = cart.items()[0].item_id;
        assert_eq!(cart.total_amount(), Money::from_cents(3000));

        let cart = service.update_item_quantity(owner, item_id, 3).await.unwrap();
        assert_eq!(cart.total_items(), 3);

        let reloaded = service.get_cart(owner).await.unwrap().unwrap();
        assert_eq!(reloaded.total_amount(), Money::from_cents(4500));
        assert_eq!(reloaded.version(), cart.version());

        let cart = service.remove_item(owner, item_id).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn claimed_cart_rejects_mutations_until_released() {
        let service = service();
        let owner = OwnerId::new();
        let cart = service.add_item(owner, &widget(), 1).await.unwrap();
        let saga = AggregateId::new();

        service
            .begin_checkout(owner, saga, cart.version())
            .await
            .unwrap();

        let err = service.add_item(owner, &widget(), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = service.clear(owner).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let cart = service.abort_checkout(owner, saga, "test").await.unwrap();
        assert_eq!(cart.total_items(), 1);
        assert!(service.add_item(owner, &widget(), 1).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_claims_admit_one() {
        let service = service();
        let owner = OwnerId::new();
        let cart = service.add_item(owner, &widget(), 1).await.unwrap();

        let (a, b) = tokio::join!(
            service.begin_checkout(owner, AggregateId::new(), cart.version()),
            service.begin_checkout(owner, AggregateId::new(), cart.version()),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn completed_checkout_clears_cart() {
        let service = service();
        let owner = OwnerId::new();
        let cart = service.add_item(owner, &widget(), 4).await.unwrap();
        let saga = AggregateId::new();

        service.begin_checkout(owner, saga, cart.version()).await.unwrap();
        let cart = service
            .complete_checkout(owner, saga, AggregateId::new())
            .await
            .unwrap();

        assert!(cart.is_empty());
        assert!(!cart.checkout_in_progress());
        assert_eq!(cart.total_amount(), Money::ZERO);
    }
}
