//! Orders: creation from a cart and the status state machine.

mod engine;
pub mod transitions;

pub use engine::OrderEngine;

use common::{OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart has no items to order.
    #[error("Cart is empty")]
    EmptyCart,

    /// The cart references a product the catalog doesn't know.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// The line totals do not fit in the money type.
    #[error("Order total is too large")]
    TotalOverflow,

    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order belongs to another owner.
    #[error("Access to order {0} is forbidden")]
    Forbidden(OrderId),

    /// The requested status change is not in the transition table.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The move was legal when checked, but another request changed the
    /// order's status first.
    #[error("Invalid status transition: order {0} status changed concurrently")]
    ConcurrentUpdate(OrderId),
}

impl OrderError {
    /// True for both an illegal move and one that lost a race.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            OrderError::InvalidTransition { .. } | OrderError::ConcurrentUpdate(_)
        )
    }
}
