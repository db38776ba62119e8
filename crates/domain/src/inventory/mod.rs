//! Stock ownership: the inventory ledger and its errors.

mod ledger;

pub use ledger::InventoryLedger;

use common::{ProductId, ReservationId};
use thiserror::Error;

/// A product that could not cover the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortage {
    pub product_id: ProductId,
    pub requested: u32,
    pub available: u32,
}

impl std::fmt::Display for Shortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (requested {}, available {})",
            self.product_id, self.requested, self.available
        )
    }
}

fn join_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(Shortage::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// One or more products lacked stock; nothing was decremented.
    #[error("Insufficient stock: {}", join_shortages(.0))]
    InsufficientStock(Vec<Shortage>),

    /// The reservation's stock was already credited back.
    #[error("Reservation {0} was already released")]
    AlreadyReleased(ReservationId),

    /// The reservation is active, so there is nothing to reinstate.
    #[error("Reservation {0} is not released")]
    NotReleased(ReservationId),

    /// Reservation not found.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// Product not found.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },
}
