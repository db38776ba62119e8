//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::inventory::InventoryError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stock rule was violated.
    #[error("Inventory error: {0}")]
    Inventory(InventoryError),

    /// A cart rule was violated.
    #[error("Cart error: {0}")]
    Cart(CartError),

    /// An order rule was violated.
    #[error("Order error: {0}")]
    Order(OrderError),
}

impl From<InventoryError> for DomainError {
    fn from(e: InventoryError) -> Self {
        DomainError::Inventory(e)
    }
}

impl From<CartError> for DomainError {
    fn from(e: CartError) -> Self {
        DomainError::Cart(e)
    }
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}
