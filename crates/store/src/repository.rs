use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, Money, Order, OrderId, OrderStatus, OwnerId, Product, ProductId, Reservation,
    ReservationId,
};

use crate::Result;

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// The decrement was committed.
    Applied { remaining: u32 },

    /// Fewer units than requested were on hand; nothing changed.
    Insufficient { available: u32 },

    /// No product with that id exists.
    UnknownProduct,
}

/// The products collection.
///
/// Stock is never written directly: it only moves through
/// [`decrement_stock_if_available`](Self::decrement_stock_if_available) and
/// [`increment_stock`](Self::increment_stock), each of which is atomic for a
/// single product.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Retrieves a product by id.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Retrieves every product, ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Inserts a product with zero stock, or updates the name and price of an
    /// existing one. Stock is left untouched.
    async fn upsert_product(&self, id: &ProductId, name: &str, price: Money) -> Result<Product>;

    /// Decrements stock by `quantity` only if at least that many units remain.
    async fn decrement_stock_if_available(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement>;

    /// Increments stock by `quantity`.
    ///
    /// Returns the new stock level, or None if the product doesn't exist.
    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<Option<u32>>;
}

/// The reservations collection.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Persists a new reservation.
    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()>;

    /// Retrieves a reservation by id.
    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Marks an active reservation as released.
    ///
    /// Returns false if the reservation is missing or already released, in
    /// which case nothing changed.
    async fn mark_released(&self, id: ReservationId, at: DateTime<Utc>) -> Result<bool>;

    /// Marks a released reservation as active again.
    ///
    /// Returns false if the reservation is missing or not released.
    async fn mark_active(&self, id: ReservationId) -> Result<bool>;
}

/// The carts collection, keyed by owner.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Retrieves the owner's cart, if one was ever saved.
    async fn get_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>>;

    /// Saves the cart, replacing any previous version (last writer wins).
    async fn save_cart(&self, cart: &Cart) -> Result<()>;
}

/// The orders collection.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Retrieves an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves the owner's orders, most recent first.
    async fn list_orders_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Order>>;

    /// Compare-and-swap on the order status.
    ///
    /// Writes `new` only if the stored status is still `expected`. Returns the
    /// updated order, or None if the order is missing or its status moved on.
    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>>;
}

/// Every collection the commerce core needs, behind one cloneable handle.
pub trait Store:
    ProductRepository + ReservationRepository + CartRepository + OrderRepository + Clone + 'static
{
}

impl<T> Store for T where
    T: ProductRepository
        + ReservationRepository
        + CartRepository
        + OrderRepository
        + Clone
        + 'static
{
}
