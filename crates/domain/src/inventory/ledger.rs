//! The inventory ledger: sole writer of product stock.

use chrono::Utc;
use common::{Money, Product, ProductId, Reservation, ReservationId, ReservationLine};
use store::{ProductRepository, ReservationRepository, StockDecrement, StoreError};

use super::{InventoryError, Shortage};
use crate::error::DomainError;

/// Owns per-product stock counters.
///
/// A reservation is a sequence of per-product conditional decrements. If any
/// decrement fails, the ones already applied in the same call are credited
/// back, so callers observe all-or-nothing behaviour without a lock spanning
/// several products.
#[derive(Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S> InventoryLedger<S>
where
    S: ProductRepository + ReservationRepository,
{
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads a product by id.
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, DomainError> {
        Ok(self.store.get_product(id).await?)
    }

    /// Lists every product.
    pub async fn products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }

    /// Registers a product or updates its name and price. Stock is untouched.
    #[tracing::instrument(skip(self))]
    pub async fn register_product(
        &self,
        id: &ProductId,
        name: &str,
        price: Money,
    ) -> Result<Product, DomainError> {
        if price.is_negative() {
            return Err(InventoryError::InvalidPrice {
                price: price.cents(),
            }
            .into());
        }

        let product = self.store.upsert_product(id, name, price).await?;
        tracing::info!(product_id = %id, price = %price, "product registered");
        Ok(product)
    }

    /// Adds stock to an existing product.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, id: &ProductId, quantity: u32) -> Result<Product, DomainError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: id.clone(),
            }
            .into());
        }

        let stock = self
            .store
            .increment_stock(id, quantity)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(id.clone()))?;
        tracing::info!(product_id = %id, quantity, stock, "product restocked");

        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(id.clone()).into())
    }

    /// Reserves stock for every line, all or nothing.
    ///
    /// Lines for the same product are merged first. On success the returned
    /// reservation references exactly the decrements that were applied.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn reserve(&self, items: Vec<ReservationLine>) -> Result<Reservation, DomainError> {
        let lines = merge_lines(items)?;

        if let Err(e) = self.apply_decrements(&lines).await {
            metrics::counter!("inventory_reservations_total", "outcome" => "rejected")
                .increment(1);
            tracing::warn!(error = %e, "reservation rejected");
            return Err(e);
        }

        let reservation = Reservation::new(lines);
        if let Err(e) = self.store.insert_reservation(&reservation).await {
            // Nothing references these decrements yet
            self.roll_back(&reservation.lines).await?;
            return Err(e.into());
        }

        metrics::counter!("inventory_reservations_total", "outcome" => "committed").increment(1);
        tracing::info!(reservation_id = %reservation.id, "stock reserved");
        Ok(reservation)
    }

    /// Credits a reservation's decrements back to stock.
    ///
    /// The reservation is flagged released before any stock moves, so a
    /// second release fails with [`InventoryError::AlreadyReleased`] instead
    /// of crediting twice. If a credit fails, the lines already credited are
    /// taken again and the reservation is flagged active before the error is
    /// returned, so a failed release can be retried.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, id: ReservationId) -> Result<Reservation, DomainError> {
        let reservation = self
            .store
            .get_reservation(id)
            .await?
            .ok_or(InventoryError::ReservationNotFound(id))?;

        let released_at = Utc::now();
        if !self.store.mark_released(id, released_at).await? {
            tracing::warn!(reservation_id = %id, "reservation already released");
            return Err(InventoryError::AlreadyReleased(id).into());
        }

        let mut credited = Vec::with_capacity(reservation.lines.len());
        for line in &reservation.lines {
            match self
                .store
                .increment_stock(&line.product_id, line.quantity)
                .await
            {
                Ok(Some(_)) => credited.push(line.clone()),
                Ok(None) => tracing::warn!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    "released stock for a product that no longer exists"
                ),
                Err(e) => {
                    tracing::warn!(reservation_id = %id, error = %e, "release failed, undoing");
                    if let Err(undo_err) = self.abort_release(id, &credited).await {
                        tracing::error!(
                            reservation_id = %id,
                            error = %undo_err,
                            "failed to undo partial release"
                        );
                    }
                    return Err(e.into());
                }
            }
        }

        metrics::counter!("inventory_releases_total").increment(1);
        tracing::info!(reservation_id = %id, "reservation released");
        Ok(Reservation {
            released_at: Some(released_at),
            ..reservation
        })
    }

    /// Takes a released reservation's stock again.
    ///
    /// Used when the status change that followed a release lost a race. The
    /// decrements follow the same all-or-nothing rule as [`reserve`](Self::reserve).
    #[tracing::instrument(skip(self))]
    pub async fn reinstate(&self, id: ReservationId) -> Result<Reservation, DomainError> {
        let reservation = self
            .store
            .get_reservation(id)
            .await?
            .ok_or(InventoryError::ReservationNotFound(id))?;

        if !reservation.is_released() {
            return Err(InventoryError::NotReleased(id).into());
        }

        self.apply_decrements(&reservation.lines).await?;

        if !self.store.mark_active(id).await? {
            self.roll_back(&reservation.lines).await?;
            return Err(InventoryError::NotReleased(id).into());
        }

        tracing::info!(reservation_id = %id, "reservation reinstated");
        Ok(Reservation {
            released_at: None,
            ..reservation
        })
    }

    /// Takes back the lines a failed release already credited and flags the
    /// reservation active again.
    async fn abort_release(
        &self,
        id: ReservationId,
        credited: &[ReservationLine],
    ) -> Result<(), DomainError> {
        self.apply_decrements(credited).await?;
        if !self.store.mark_active(id).await? {
            return Err(InventoryError::NotReleased(id).into());
        }
        Ok(())
    }

    /// Applies each decrement in turn, rolling back on the first failure.
    async fn apply_decrements(&self, lines: &[ReservationLine]) -> Result<(), DomainError> {
        for (applied, line) in lines.iter().enumerate() {
            let outcome = self
                .store
                .decrement_stock_if_available(&line.product_id, line.quantity)
                .await;

            let failure: DomainError = match outcome {
                Ok(StockDecrement::Applied { .. }) => continue,
                Ok(StockDecrement::Insufficient { available }) => {
                    let mut shortages = vec![Shortage {
                        product_id: line.product_id.clone(),
                        requested: line.quantity,
                        available,
                    }];
                    self.roll_back(&lines[..applied]).await?;
                    shortages.extend(self.shortages_among(&lines[applied + 1..]).await?);
                    return Err(InventoryError::InsufficientStock(shortages).into());
                }
                Ok(StockDecrement::UnknownProduct) => {
                    InventoryError::ProductNotFound(line.product_id.clone()).into()
                }
                Err(e) => e.into(),
            };

            self.roll_back(&lines[..applied]).await?;
            return Err(failure);
        }

        Ok(())
    }

    /// Credits back decrements that were applied earlier in the same call.
    async fn roll_back(&self, lines: &[ReservationLine]) -> Result<(), StoreError> {
        for line in lines {
            if let Err(e) = self
                .store
                .increment_stock(&line.product_id, line.quantity)
                .await
            {
                tracing::error!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %e,
                    "failed to roll back stock decrement"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Reports which of the remaining lines would also fall short.
    ///
    /// Read-only and advisory: it only enriches the error message.
    async fn shortages_among(
        &self,
        lines: &[ReservationLine],
    ) -> Result<Vec<Shortage>, StoreError> {
        let mut shortages = Vec::new();
        for line in lines {
            let available = self
                .store
                .get_product(&line.product_id)
                .await?
                .map_or(0, |p| p.stock_qty);
            if available < line.quantity {
                shortages.push(Shortage {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available,
                });
            }
        }
        Ok(shortages)
    }
}

/// Validates quantities and merges lines for the same product, keeping the
/// order in which products first appear.
fn merge_lines(items: Vec<ReservationLine>) -> Result<Vec<ReservationLine>, InventoryError> {
    let mut merged: Vec<ReservationLine> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: item.product_id,
            });
        }

        match merged.iter_mut().find(|l| l.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(item.quantity).ok_or(
                    InventoryError::InvalidQuantity {
                        product_id: item.product_id,
                    },
                )?;
            }
            None => merged.push(item),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;

    async fn ledger_with(stock: &[(&str, u32)]) -> InventoryLedger<InMemoryStore> {
        let ledger = InventoryLedger::new(InMemoryStore::new());
        for (sku, qty) in stock {
            let id = ProductId::new(*sku);
            ledger
                .register_product(&id, sku, Money::from_cents(1000))
                .await
                .unwrap();
            if *qty > 0 {
                ledger.restock(&id, *qty).await.unwrap();
            }
        }
        ledger
    }

    async fn stock_of(ledger: &InventoryLedger<InMemoryStore>, sku: &str) -> u32 {
        ledger
            .product(&ProductId::new(sku))
            .await
            .unwrap()
            .unwrap()
            .stock_qty
    }

    #[tokio::test]
    async fn test_reserve_decrements_every_line() {
        let ledger = ledger_with(&[("SKU-001", 10), ("SKU-002", 5)]).await;

        let reservation = ledger
            .reserve(vec![
                ReservationLine::new("SKU-001", 3),
                ReservationLine::new("SKU-002", 5),
            ])
            .await
            .unwrap();

        assert!(!reservation.is_released());
        assert_eq!(reservation.lines.len(), 2);
        assert_eq!(stock_of(&ledger, "SKU-001").await, 7);
        assert_eq!(stock_of(&ledger, "SKU-002").await, 0);
    }

    #[tokio::test]
    async fn test_reserve_rolls_back_on_later_shortage() {
        let ledger = ledger_with(&[("SKU-001", 10), ("SKU-002", 1), ("SKU-003", 0)]).await;

        let err = ledger
            .reserve(vec![
                ReservationLine::new("SKU-001", 4),
                ReservationLine::new("SKU-002", 2),
                ReservationLine::new("SKU-003", 1),
            ])
            .await
            .unwrap_err();

        match err {
            DomainError::Inventory(InventoryError::InsufficientStock(shortages)) => {
                let ids: Vec<_> = shortages.iter().map(|s| s.product_id.as_str()).collect();
                assert_eq!(ids, vec!["SKU-002", "SKU-003"]);
                assert_eq!(shortages[0].available, 1);
                assert_eq!(shortages[0].requested, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(stock_of(&ledger, "SKU-001").await, 10);
        assert_eq!(stock_of(&ledger, "SKU-002").await, 1);
        assert_eq!(ledger.store.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn test_reserve_unknown_product_rolls_back() {
        let ledger = ledger_with(&[("SKU-001", 10)]).await;

        let err = ledger
            .reserve(vec![
                ReservationLine::new("SKU-001", 4),
                ReservationLine::new("SKU-404", 1),
            ])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::ProductNotFound(_))
        ));
        assert_eq!(stock_of(&ledger, "SKU-001").await, 10);
    }

    #[tokio::test]
    async fn test_reserve_merges_duplicate_lines() {
        let ledger = ledger_with(&[("SKU-001", 5)]).await;

        let reservation = ledger
            .reserve(vec![
                ReservationLine::new("SKU-001", 2),
                ReservationLine::new("SKU-001", 3),
            ])
            .await
            .unwrap();

        assert_eq!(reservation.lines, vec![ReservationLine::new("SKU-001", 5)]);
        assert_eq!(stock_of(&ledger, "SKU-001").await, 0);
    }

    #[tokio::test]
    async fn test_reserve_rejects_zero_quantity() {
        let ledger = ledger_with(&[("SKU-001", 5)]).await;

        let err = ledger
            .reserve(vec![ReservationLine::new("SKU-001", 0)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::InvalidQuantity { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_restores_stock_once() {
        let ledger = ledger_with(&[("SKU-001", 10)]).await;
        let reservation = ledger
            .reserve(vec![ReservationLine::new("SKU-001", 6)])
            .await
            .unwrap();

        let released = ledger.release(reservation.id).await.unwrap();
        assert!(released.is_released());
        assert_eq!(stock_of(&ledger, "SKU-001").await, 10);

        let err = ledger.release(reservation.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::AlreadyReleased(_))
        ));
        assert_eq!(stock_of(&ledger, "SKU-001").await, 10);
    }

    #[tokio::test]
    async fn test_failed_release_is_undone_and_retryable() {
        let ledger = ledger_with(&[("SKU-001", 10), ("SKU-002", 10)]).await;
        let reservation = ledger
            .reserve(vec![
                ReservationLine::new("SKU-001", 3),
                ReservationLine::new("SKU-002", 6),
            ])
            .await
            .unwrap();

        // Crediting 6 back to SKU-002 would overflow its counter
        ledger
            .restock(&ProductId::new("SKU-002"), u32::MAX - 4)
            .await
            .unwrap();

        let err = ledger.release(reservation.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Store(StoreError::StockOverflow(_))
        ));
        assert_eq!(stock_of(&ledger, "SKU-001").await, 7);
        assert_eq!(stock_of(&ledger, "SKU-002").await, u32::MAX);
        let stored = ledger
            .store
            .get_reservation(reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_released());

        ledger
            .reserve(vec![ReservationLine::new("SKU-002", u32::MAX - 4)])
            .await
            .unwrap();
        ledger.release(reservation.id).await.unwrap();
        assert_eq!(stock_of(&ledger, "SKU-001").await, 10);
        assert_eq!(stock_of(&ledger, "SKU-002").await, 10);
    }

    #[tokio::test]
    async fn test_release_unknown_reservation() {
        let ledger = ledger_with(&[]).await;
        let err = ledger.release(ReservationId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::ReservationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reinstate_takes_stock_again() {
        let ledger = ledger_with(&[("SKU-001", 10)]).await;
        let reservation = ledger
            .reserve(vec![ReservationLine::new("SKU-001", 4)])
            .await
            .unwrap();
        ledger.release(reservation.id).await.unwrap();

        let reinstated = ledger.reinstate(reservation.id).await.unwrap();
        assert!(!reinstated.is_released());
        assert_eq!(stock_of(&ledger, "SKU-001").await, 6);

        let err = ledger.reinstate(reservation.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::NotReleased(_))
        ));
    }

    #[tokio::test]
    async fn test_reinstate_fails_when_stock_was_taken() {
        let ledger = ledger_with(&[("SKU-001", 4)]).await;
        let first = ledger
            .reserve(vec![ReservationLine::new("SKU-001", 4)])
            .await
            .unwrap();
        ledger.release(first.id).await.unwrap();
        ledger
            .reserve(vec![ReservationLine::new("SKU-001", 3)])
            .await
            .unwrap();

        let err = ledger.reinstate(first.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::InsufficientStock(_))
        ));
        assert_eq!(stock_of(&ledger, "SKU-001").await, 1);
    }

    #[tokio::test]
    async fn test_restock_requires_known_product() {
        let ledger = ledger_with(&[]).await;
        let err = ledger
            .restock(&ProductId::new("SKU-404"), 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_negative_price() {
        let ledger = ledger_with(&[]).await;
        let err = ledger
            .register_product(&ProductId::new("SKU-001"), "Widget", Money::from_cents(-1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Inventory(InventoryError::InvalidPrice { price: -1 })
        ));
    }
}
