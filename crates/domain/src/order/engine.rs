//! Order creation and the status lifecycle.

use std::time::Instant;

use chrono::Utc;
use common::{
    Order, OrderId, OrderLineItem, OrderStatus, OwnerId, ReservationId, ReservationLine,
};
use store::Store;

use super::{OrderError, transitions};
use crate::cart::CartStore;
use crate::error::DomainError;
use crate::inventory::{InventoryError, InventoryLedger};

/// Turns carts into orders and drives orders through their status lifecycle.
///
/// Stock only moves through the [`InventoryLedger`]: creation reserves it and
/// cancellation releases it. Every status write is a compare-and-swap on the
/// status that was read, so concurrent transitions on one order have a single
/// winner.
#[derive(Clone)]
pub struct OrderEngine<S> {
    store: S,
    ledger: InventoryLedger<S>,
    carts: CartStore<S>,
}

impl<S: Store> OrderEngine<S> {
    /// Creates a new engine. The ledger and cart store share `store`.
    pub fn new(store: S) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            carts: CartStore::new(store.clone()),
            store,
        }
    }

    /// Returns the inventory ledger.
    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Returns the cart store.
    pub fn carts(&self) -> &CartStore<S> {
        &self.carts
    }

    /// Converts the owner's cart into a pending order.
    ///
    /// Prices are snapshotted from the catalog, then stock for every line is
    /// reserved in one all-or-nothing step. On any failure no order exists and
    /// the cart is left as it was. The cart is cleared only once the order is
    /// persisted. Orders whose total would not fit in [`common::Money`] are
    /// rejected before any stock moves.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, owner_id: OwnerId) -> Result<Order, DomainError> {
        let started = Instant::now();

        let cart = self.carts.get(owner_id).await?;
        if cart.is_empty() {
            return Err(OrderError::EmptyCart.into());
        }

        let mut items = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = self
                .store
                .get_product(&item.product_id)
                .await?
                .ok_or_else(|| OrderError::UnknownProduct(item.product_id.clone()))?;
            items.push(OrderLineItem::new(product.id, item.quantity, product.price));
        }
        if Order::checked_total(&items).is_none() {
            return Err(OrderError::TotalOverflow.into());
        }

        let lines = items
            .iter()
            .map(|i| ReservationLine::new(i.product_id.clone(), i.quantity))
            .collect();
        let reservation = self.ledger.reserve(lines).await.map_err(|e| match e {
            DomainError::Inventory(InventoryError::ProductNotFound(id)) => {
                OrderError::UnknownProduct(id).into()
            }
            other => other,
        })?;

        let order = Order::new(owner_id, items, reservation.id);
        if let Err(e) = self.store.insert_order(&order).await {
            tracing::error!(
                error = %e,
                reservation_id = %reservation.id,
                "failed to persist order"
            );
            if let Err(release_err) = self.ledger.release(reservation.id).await {
                tracing::error!(
                    error = %release_err,
                    reservation_id = %reservation.id,
                    "failed to release reservation of unsaved order"
                );
            }
            return Err(e.into());
        }

        if let Err(e) = self.carts.clear(owner_id).await {
            // The order is already persisted
            tracing::error!(error = %e, order_id = %order.id, "failed to clear cart after order");
        }

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("order_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(order_id = %order.id, total = %order.total(), "order created");
        Ok(order)
    }

    /// Loads an order on behalf of its owner.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        requester: OwnerId,
    ) -> Result<Order, DomainError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        if order.owner_id != requester {
            tracing::warn!(%order_id, %requester, "order access denied");
            return Err(OrderError::Forbidden(order_id).into());
        }
        Ok(order)
    }

    /// Lists the owner's orders, most recent first.
    pub async fn list_orders(&self, owner_id: OwnerId) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders_for_owner(owner_id).await?)
    }

    /// Moves an order to `target` if the transition table allows it.
    ///
    /// A target of [`OrderStatus::Cancelled`] goes through
    /// [`cancel_order`](Self::cancel_order) so the stock is released.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        requester: OwnerId,
        target: OrderStatus,
    ) -> Result<Order, DomainError> {
        if target == OrderStatus::Cancelled {
            return self.cancel_order(order_id, requester).await;
        }

        let order = self.get_order(order_id, requester).await?;
        transitions::ensure(order.status, target)?;

        match self
            .store
            .update_status_if(order_id, order.status, target, Utc::now())
            .await?
        {
            Some(updated) => {
                metrics::counter!("order_status_transitions_total", "to" => target.as_str())
                    .increment(1);
                tracing::info!(
                    %order_id,
                    from = %order.status,
                    to = %target,
                    "order status changed"
                );
                Ok(updated)
            }
            None => Err(self.lost_race(order_id, target).await),
        }
    }

    /// Cancels a pending or paid order and returns its stock.
    ///
    /// The reservation is released before the status is written. If the
    /// status write then loses to a concurrent transition, the release is
    /// reinstated and the call fails with [`OrderError::ConcurrentUpdate`], or
    /// [`OrderError::InvalidTransition`] if the new status no longer allows it.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        requester: OwnerId,
    ) -> Result<Order, DomainError> {
        let order = self.get_order(order_id, requester).await?;
        transitions::ensure(order.status, OrderStatus::Cancelled)?;

        match self.ledger.release(order.reservation_id).await {
            Ok(_) => {}
            Err(DomainError::Inventory(InventoryError::AlreadyReleased(_))) => {
                // A concurrent cancel got there first
                return Err(self.lost_race(order_id, OrderStatus::Cancelled).await);
            }
            Err(e) => return Err(e),
        }

        let swapped = self
            .store
            .update_status_if(order_id, order.status, OrderStatus::Cancelled, Utc::now())
            .await;

        match swapped {
            Ok(Some(cancelled)) => {
                metrics::counter!("orders_cancelled_total").increment(1);
                metrics::counter!(
                    "order_status_transitions_total",
                    "to" => OrderStatus::Cancelled.as_str()
                )
                .increment(1);
                tracing::info!(%order_id, from = %order.status, "order cancelled");
                Ok(cancelled)
            }
            Ok(None) => {
                self.undo_release(order.reservation_id).await?;
                Err(self.lost_race(order_id, OrderStatus::Cancelled).await)
            }
            Err(e) => {
                self.undo_release(order.reservation_id).await?;
                Err(e.into())
            }
        }
    }

    /// Re-takes stock released by a cancellation whose status write failed.
    async fn undo_release(&self, reservation_id: ReservationId) -> Result<(), DomainError> {
        if let Err(e) = self.ledger.reinstate(reservation_id).await {
            tracing::error!(
                error = %e,
                %reservation_id,
                "failed to reinstate reservation after lost status write"
            );
            return Err(e);
        }
        Ok(())
    }

    /// Builds the error for a compare-and-swap that matched nothing.
    ///
    /// The move is re-checked against the status now stored: if it is still
    /// legal the caller only lost a race and may retry.
    async fn lost_race(&self, order_id: OrderId, to: OrderStatus) -> DomainError {
        match self.store.get_order(order_id).await {
            Ok(Some(current)) => {
                tracing::warn!(
                    %order_id,
                    current = %current.status,
                    %to,
                    "status write lost a race"
                );
                match transitions::ensure(current.status, to) {
                    Ok(()) => OrderError::ConcurrentUpdate(order_id).into(),
                    Err(e) => e.into(),
                }
            }
            Ok(None) => OrderError::NotFound(order_id).into(),
            Err(e) => e.into(),
        }
    }
}
