//! Integration tests for carts, stock reservations and the order lifecycle.
//!
//! Everything runs against the in-memory store; the concurrency tests spawn
//! real tasks on a multi-threaded runtime.

use common::{Money, OrderStatus, OwnerId, ProductId};
use domain::{DomainError, InventoryError, OrderEngine, OrderError};
use futures_util::future::join_all;
use store::{InMemoryStore, StoreError};

async fn engine_with_stock(stock: &[(&str, u32)]) -> OrderEngine<InMemoryStore> {
    let engine = OrderEngine::new(InMemoryStore::new());
    for (sku, qty) in stock {
        let id = ProductId::new(*sku);
        engine
            .ledger()
            .register_product(&id, "Widget", Money::from_cents(1000))
            .await
            .unwrap();
        engine.ledger().restock(&id, *qty).await.unwrap();
    }
    engine
}

async fn stock_of(engine: &OrderEngine<InMemoryStore>, sku: &str) -> u32 {
    engine
        .ledger()
        .product(&ProductId::new(sku))
        .await
        .unwrap()
        .unwrap()
        .stock_qty
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn cart_to_order_to_cancellation() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owner = OwnerId::new();

        engine
            .carts()
            .add(owner, ProductId::new("P"), 3)
            .await
            .unwrap();

        let order = engine.create_order(owner).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(stock_of(&engine, "P").await, 7);
        assert!(engine.carts().get(owner).await.unwrap().is_empty());

        let cancelled = engine.cancel_order(order.id, owner).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&engine, "P").await, 10);
    }

    #[tokio::test]
    async fn full_forward_path() {
        let engine = engine_with_stock(&[("P", 5)]).await;
        let owner = OwnerId::new();
        engine
            .carts()
            .add(owner, ProductId::new("P"), 1)
            .await
            .unwrap();
        let order = engine.create_order(owner).await.unwrap();

        let err = engine
            .update_status(order.id, owner, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition { .. })
        ));

        for status in [
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            engine
                .update_status(order.id, owner, status)
                .await
                .unwrap();
        }

        let delivered = engine.get_order(order.id, owner).await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(stock_of(&engine, "P").await, 4);

        let err = engine.cancel_order(order.id, owner).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn orders_are_listed_most_recent_first() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owner = OwnerId::new();

        let mut created = Vec::new();
        for _ in 0..3 {
            engine
                .carts()
                .add(owner, ProductId::new("P"), 1)
                .await
                .unwrap();
            created.push(engine.create_order(owner).await.unwrap());
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = engine.list_orders(owner).await.unwrap();
        let listed_ids: Vec<_> = listed.iter().map(|o| o.id).collect();
        let expected: Vec<_> = created.iter().rev().map(|o| o.id).collect();
        assert_eq!(listed_ids, expected);

        assert!(engine.list_orders(OwnerId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_owners_cannot_touch_an_order() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owner = OwnerId::new();
        let intruder = OwnerId::new();
        engine
            .carts()
            .add(owner, ProductId::new("P"), 2)
            .await
            .unwrap();
        let order = engine.create_order(owner).await.unwrap();

        for result in [
            engine.get_order(order.id, intruder).await,
            engine
                .update_status(order.id, intruder, OrderStatus::Paid)
                .await,
            engine.cancel_order(order.id, intruder).await,
        ] {
            assert!(matches!(
                result,
                Err(DomainError::Order(OrderError::Forbidden(_)))
            ));
        }
        assert_eq!(stock_of(&engine, "P").await, 8);
    }
}

mod failure_handling {
    use super::*;

    #[tokio::test]
    async fn shortage_names_every_short_product() {
        let engine = engine_with_stock(&[("A", 10), ("B", 1), ("C", 0)]).await;
        let owner = OwnerId::new();
        for (sku, qty) in [("A", 2), ("B", 2), ("C", 1)] {
            engine
                .carts()
                .add(owner, ProductId::new(sku), qty)
                .await
                .unwrap();
        }

        let err = engine.create_order(owner).await.unwrap_err();
        let DomainError::Inventory(InventoryError::InsufficientStock(shortages)) = err else {
            panic!("expected InsufficientStock, got {err:?}");
        };
        let short: Vec<_> = shortages.iter().map(|s| s.product_id.as_str()).collect();
        assert_eq!(short, vec!["B", "C"]);

        assert_eq!(stock_of(&engine, "A").await, 10);
        assert_eq!(engine.carts().get(owner).await.unwrap().items.len(), 3);
    }

    #[tokio::test]
    async fn failed_insert_returns_stock() {
        let store = InMemoryStore::new();
        let engine = OrderEngine::new(store.clone());
        let id = ProductId::new("P");
        engine
            .ledger()
            .register_product(&id, "Widget", Money::from_cents(1000))
            .await
            .unwrap();
        engine.ledger().restock(&id, 10).await.unwrap();

        let owner = OwnerId::new();
        engine.carts().add(owner, id.clone(), 6).await.unwrap();

        store.set_fail_order_inserts(true);
        assert!(engine.create_order(owner).await.is_err());
        assert_eq!(stock_of(&engine, "P").await, 10);

        store.set_fail_order_inserts(false);
        let order = engine.create_order(owner).await.unwrap();
        assert_eq!(order.items[0].quantity, 6);
        assert_eq!(stock_of(&engine, "P").await, 4);
    }
    #[tokio::test]
    async fn failed_cancel_can_be_retried() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owner = OwnerId::new();
        engine
            .carts()
            .add(owner, ProductId::new("P"), 6)
            .await
            .unwrap();
        let order = engine.create_order(owner).await.unwrap();

        // Fill the counter so crediting the 6 units back overflows
        engine
            .ledger()
            .restock(&ProductId::new("P"), u32::MAX - 4)
            .await
            .unwrap();
        let err = engine.cancel_order(order.id, owner).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Store(StoreError::StockOverflow(_))
        ));
        let loaded = engine.get_order(order.id, owner).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);

        let drain = OwnerId::new();
        engine
            .carts()
            .add(drain, ProductId::new("P"), i64::from(u32::MAX - 4))
            .await
            .unwrap();
        engine.create_order(drain).await.unwrap();
        assert_eq!(stock_of(&engine, "P").await, 4);

        let cancelled = engine.cancel_order(order.id, owner).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&engine, "P").await, 10);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn competing_orders_never_oversell() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owners = [OwnerId::new(), OwnerId::new()];
        for owner in owners {
            engine
                .carts()
                .add(owner, ProductId::new("P"), 6)
                .await
                .unwrap();
        }

        let handles = owners.map(|owner| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.create_order(owner).await })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DomainError::Inventory(InventoryError::InsufficientStock(_)))
        )));
        assert_eq!(stock_of(&engine, "P").await, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_small_orders_drain_stock_exactly() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owners: Vec<_> = (0..25).map(|_| OwnerId::new()).collect();
        for owner in &owners {
            engine
                .carts()
                .add(*owner, ProductId::new("P"), 1)
                .await
                .unwrap();
        }

        let handles = owners.iter().map(|owner| {
            let engine = engine.clone();
            let owner = *owner;
            tokio::spawn(async move { engine.create_order(owner).await })
        });
        let results = join_all(handles).await;

        let succeeded = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(succeeded, 10);
        assert_eq!(stock_of(&engine, "P").await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_orders_in_opposite_order_stay_all_or_nothing() {
        let engine = engine_with_stock(&[("A", 9), ("B", 9)]).await;
        let owners: Vec<_> = (0..8).map(|_| OwnerId::new()).collect();
        for (i, owner) in owners.iter().enumerate() {
            let skus = if i % 2 == 0 { ["A", "B"] } else { ["B", "A"] };
            for sku in skus {
                engine
                    .carts()
                    .add(*owner, ProductId::new(sku), 3)
                    .await
                    .unwrap();
            }
        }

        let handles = owners.iter().map(|owner| {
            let engine = engine.clone();
            let owner = *owner;
            tokio::spawn(async move { engine.create_order(owner).await })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count() as u32;
        assert!(succeeded <= 3, "{succeeded} orders succeeded");
        for result in &results {
            if let Err(err) = result {
                assert!(
                    matches!(
                        err,
                        DomainError::Inventory(InventoryError::InsufficientStock(_))
                    ),
                    "unexpected error {err:?}"
                );
            }
        }
        assert_eq!(stock_of(&engine, "A").await, 9 - 3 * succeeded);
        assert_eq!(stock_of(&engine, "B").await, 9 - 3 * succeeded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancels_release_once() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owner = OwnerId::new();
        engine
            .carts()
            .add(owner, ProductId::new("P"), 4)
            .await
            .unwrap();
        let order = engine.create_order(owner).await.unwrap();

        let handles = (0..4).map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.cancel_order(order.id, owner).await })
        });
        let results = join_all(handles).await;

        let succeeded = results
            .iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(succeeded, 1);
        for result in results {
            if let Err(err) = result.unwrap() {
                assert!(
                    matches!(&err, DomainError::Order(e) if e.is_invalid_transition()),
                    "unexpected error {err:?}"
                );
            }
        }
        assert_eq!(stock_of(&engine, "P").await, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_racing_ship_keeps_stock_consistent() {
        let engine = engine_with_stock(&[("P", 10)]).await;
        let owner = OwnerId::new();
        engine
            .carts()
            .add(owner, ProductId::new("P"), 4)
            .await
            .unwrap();
        let order = engine.create_order(owner).await.unwrap();
        engine
            .update_status(order.id, owner, OrderStatus::Paid)
            .await
            .unwrap();

        let cancel = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.cancel_order(order.id, owner).await })
        };
        let ship = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .update_status(order.id, owner, OrderStatus::Shipped)
                    .await
            })
        };
        let (cancel, ship) = (cancel.await.unwrap(), ship.await.unwrap());

        let final_order = engine.get_order(order.id, owner).await.unwrap();
        match final_order.status {
            OrderStatus::Cancelled => {
                assert!(cancel.is_ok());
                assert!(ship.is_err());
                assert_eq!(stock_of(&engine, "P").await, 10);
            }
            OrderStatus::Shipped => {
                assert!(ship.is_ok());
                assert!(matches!(
                    cancel,
                    Err(DomainError::Order(ref e)) if e.is_invalid_transition()
                ));
                assert_eq!(stock_of(&engine, "P").await, 6);
            }
            other => panic!("unexpected final status {other}"),
        }
    }
}
