//! Persistence for the commerce core.
//!
//! The repository traits in [`repository`] describe the four collections
//! (products, reservations, carts, orders). Every mutation that protects an
//! invariant is a single conditional update, so the same guarantees hold for
//! [`InMemoryStore`] and for [`PostgresStore`] shared by several processes.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{
    CartRepository, OrderRepository, ProductRepository, ReservationRepository, StockDecrement,
    Store,
};
