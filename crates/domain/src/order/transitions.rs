//! The order status transition table.
//!
//! Every status change in the engine is checked here and nowhere else.

use common::OrderStatus;

use super::OrderError;

/// Legal `(from, to)` pairs.
pub const ALLOWED: [(OrderStatus, OrderStatus); 5] = [
    (OrderStatus::Pending, OrderStatus::Paid),
    (OrderStatus::Paid, OrderStatus::Shipped),
    (OrderStatus::Shipped, OrderStatus::Delivered),
    (OrderStatus::Pending, OrderStatus::Cancelled),
    (OrderStatus::Paid, OrderStatus::Cancelled),
];

/// Returns true if an order may move from `from` to `to`.
pub fn is_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    ALLOWED.contains(&(from, to))
}

/// Fails with [`OrderError::InvalidTransition`] unless the move is legal.
pub fn ensure(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if is_allowed(from, to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}
