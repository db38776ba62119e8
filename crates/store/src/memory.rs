use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, Money, Order, OrderId, OrderStatus, OwnerId, Product, ProductId, Reservation,
    ReservationId,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    repository::{
        CartRepository, OrderRepository, ProductRepository, ReservationRepository, StockDecrement,
    },
};

/// In-memory store implementation.
///
/// Each collection sits behind its own lock and every conditional update runs
/// under a single write guard, which gives the same per-entity atomicity as
/// the PostgreSQL implementation. Used by tests and by the server when no
/// database is configured.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    reservations: Arc<RwLock<HashMap<ReservationId, Reservation>>>,
    carts: Arc<RwLock<HashMap<OwnerId, Cart>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    fail_order_inserts: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject order inserts.
    pub fn set_fail_order_inserts(&self, fail: bool) {
        self.fail_order_inserts.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the total number of reservations stored.
    pub async fn reservation_count(&self) -> usize {
        self.reservations.read().await.len()
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        let mut all: Vec<_> = products.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn upsert_product(&self, id: &ProductId, name: &str, price: Money) -> Result<Product> {
        let mut products = self.products.write().await;
        let product = products
            .entry(id.clone())
            .or_insert_with(|| Product::new(id.clone(), name, price));
        product.name = name.to_string();
        product.price = price;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn decrement_stock_if_available(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(id) else {
            return Ok(StockDecrement::UnknownProduct);
        };

        if product.stock_qty < quantity {
            return Ok(StockDecrement::Insufficient {
                available: product.stock_qty,
            });
        }

        product.stock_qty -= quantity;
        product.updated_at = Utc::now();
        Ok(StockDecrement::Applied {
            remaining: product.stock_qty,
        })
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<Option<u32>> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(id) else {
            return Ok(None);
        };

        product.stock_qty = product
            .stock_qty
            .checked_add(quantity)
            .ok_or_else(|| StoreError::StockOverflow(id.clone()))?;
        product.updated_at = Utc::now();
        Ok(Some(product.stock_qty))
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        self.reservations
            .write()
            .await
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.reservations.read().await.get(&id).cloned())
    }

    async fn mark_released(&self, id: ReservationId, at: DateTime<Utc>) -> Result<bool> {
        let mut reservations = self.reservations.write().await;
        match reservations.get_mut(&id) {
            Some(reservation) if reservation.released_at.is_none() => {
                reservation.released_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_active(&self, id: ReservationId) -> Result<bool> {
        let mut reservations = self.reservations.write().await;
        match reservations.get_mut(&id) {
            Some(reservation) if reservation.released_at.is_some() => {
                reservation.released_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn get_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&owner_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.carts.write().await.insert(cart.owner_id, cart.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        if self.fail_order_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order inserts disabled".to_string()));
        }

        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_orders_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut owned: Vec<_> = orders
            .values()
            .filter(|o| o.owner_id == owner_id)
            .cloned()
            .collect();

        // Most recent first; id breaks ties between orders created in the same instant
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }

    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&id) {
            Some(order) if order.status == expected => {
                order.status = new;
                order.updated_at = at;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}
