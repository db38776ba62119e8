use chrono::Utc;
use common::{Cart, CartItem, OwnerId, ProductId};
use store::CartRepository;

use super::CartError;
use crate::error::DomainError;

/// Service for managing the single cart each owner has.
///
/// Carts are never shared between owners, so mutations are a plain
/// load-modify-save with last-writer-wins semantics.
#[derive(Clone)]
pub struct CartStore<S> {
    store: S,
}

impl<S: CartRepository> CartStore<S> {
    /// Creates a new cart store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the owner's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, owner_id: OwnerId) -> Result<Cart, DomainError> {
        if let Some(cart) = self.store.get_cart(owner_id).await? {
            return Ok(cart);
        }

        let cart = Cart::empty(owner_id);
        self.store.save_cart(&cart).await?;
        tracing::debug!(%owner_id, "created empty cart");
        Ok(cart)
    }

    /// Adds units of a product, merging with an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        let quantity = positive_quantity(quantity)?;

        self.mutate(owner_id, |cart| {
            match cart.items.iter_mut().find(|i| i.product_id == product_id) {
                Some(item) => {
                    item.quantity = item.quantity.checked_add(quantity).ok_or(
                        CartError::InvalidQuantity {
                            quantity: i64::from(item.quantity) + i64::from(quantity),
                        },
                    )?;
                }
                None => cart.items.push(CartItem::new(product_id, quantity)),
            }
            Ok(())
        })
        .await
    }

    /// Removes a product's line. Removing an absent product is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn remove(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
    ) -> Result<Cart, DomainError> {
        self.mutate(owner_id, |cart| {
            cart.items.retain(|i| i.product_id != product_id);
            Ok(())
        })
        .await
    }

    /// Sets the exact quantity for a product.
    ///
    /// A quantity of zero or less removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        if quantity <= 0 {
            return self.remove(owner_id, product_id).await;
        }
        let quantity = positive_quantity(quantity)?;

        self.mutate(owner_id, |cart| {
            match cart.items.iter_mut().find(|i| i.product_id == product_id) {
                Some(item) => item.quantity = quantity,
                None => cart.items.push(CartItem::new(product_id, quantity)),
            }
            Ok(())
        })
        .await
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner_id: OwnerId) -> Result<Cart, DomainError> {
        self.mutate(owner_id, |cart| {
            cart.items.clear();
            Ok(())
        })
        .await
    }

    async fn mutate<F>(&self, owner_id: OwnerId, change: F) -> Result<Cart, DomainError>
    where
        F: FnOnce(&mut Cart) -> Result<(), CartError>,
    {
        let mut cart = self
            .store
            .get_cart(owner_id)
            .await?
            .unwrap_or_else(|| Cart::empty(owner_id));

        change(&mut cart)?;
        cart.updated_at = Utc::now();

        self.store.save_cart(&cart).await?;
        Ok(cart)
    }
}

fn positive_quantity(quantity: i64) -> Result<u32, CartError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(CartError::InvalidQuantity { quantity })
}
