//! Shared identifiers and data model for the commerce core.
//!
//! Everything here is plain data: the rules that govern how carts, orders and
//! stock change live in the `domain` crate.

pub mod cart;
pub mod ids;
pub mod money;
pub mod order;
pub mod product;
pub mod reservation;

pub use cart::{Cart, CartItem};
pub use ids::{OrderId, OwnerId, ParseIdError, ReservationId};
pub use money::Money;
pub use order::{Order, OrderLineItem, OrderStatus, ParseStatusError};
pub use product::{Product, ProductId};
pub use reservation::{Reservation, ReservationLine};
