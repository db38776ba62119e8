//! Domain layer for the commerce core.
//!
//! This crate provides the three services that protect the system's invariants:
//! - [`InventoryLedger`]: the only writer of product stock, with all-or-nothing
//!   multi-product reservations
//! - [`CartStore`]: one mutable cart per owner
//! - [`OrderEngine`]: cart to order conversion and the order status state machine

pub mod cart;
pub mod error;
pub mod inventory;
pub mod order;

pub use cart::{CartError, CartStore};
pub use error::DomainError;
pub use inventory::{InventoryError, InventoryLedger, Shortage};
pub use order::{OrderEngine, OrderError, transitions};
