use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, CartItem, Money, Order, OrderId, OrderLineItem, OrderStatus, OwnerId, Product,
    ProductId, Reservation, ReservationId, ReservationLine,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    repository::{
        CartRepository, OrderRepository, ProductRepository, ReservationRepository, StockDecrement,
    },
};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock_qty, updated_at";
const ORDER_COLUMNS: &str = "id, owner_id, items, status, reservation_id, created_at, updated_at";

/// PostgreSQL-backed store implementation.
///
/// Every conditional update is a single `UPDATE ... WHERE` statement, so the
/// stock and status guarantees hold across any number of server processes.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let stock: i64 = row.try_get("stock_qty")?;
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_qty: stock_from_db(stock)?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_reservation(row: PgRow) -> Result<Reservation> {
        let lines: serde_json::Value = row.try_get("lines")?;
        let lines: Vec<ReservationLine> = serde_json::from_value(lines)?;

        Ok(Reservation {
            id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            lines,
            created_at: row.try_get("created_at")?,
            released_at: row.try_get("released_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items: serde_json::Value = row.try_get("items")?;
        let items: Vec<OrderLineItem> = serde_json::from_value(items)?;
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt {
                entity: "order",
                reason: e.to_string(),
            })?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            items,
            status,
            reservation_id: ReservationId::from_uuid(row.try_get::<Uuid, _>("reservation_id")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn stock_from_db(stock: i64) -> Result<u32> {
    u32::try_from(stock).map_err(|_| StoreError::Corrupt {
        entity: "product",
        reason: format!("stock_qty {stock} out of range"),
    })
}

#[async_trait]
impl ProductRepository for PostgresStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn upsert_product(&self, id: &ProductId, name: &str, price: Money) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, price_cents, stock_qty, updated_at)
            VALUES ($1, $2, $3, 0, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                updated_at = EXCLUDED.updated_at
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_str())
        .bind(name)
        .bind(price.cents())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn decrement_stock_if_available(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_qty = stock_qty - $2, updated_at = NOW()
            WHERE id = $1 AND stock_qty >= $2
            RETURNING stock_qty
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(StockDecrement::Applied {
                remaining: stock_from_db(remaining)?,
            });
        }

        // The conditional update matched nothing: either short or missing
        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock_qty FROM products WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match available {
            Some(available) => Ok(StockDecrement::Insufficient {
                available: stock_from_db(available)?,
            }),
            None => Ok(StockDecrement::UnknownProduct),
        }
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<Option<u32>> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_qty = stock_qty + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock_qty
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("products_stock_range")
            {
                return StoreError::StockOverflow(id.clone());
            }
            StoreError::Database(e)
        })?;

        stock.map(stock_from_db).transpose()
    }
}

#[async_trait]
impl ReservationRepository for PostgresStore {
    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        let lines = serde_json::to_value(&reservation.lines)?;

        sqlx::query(
            r#"
            INSERT INTO reservations (id, lines, created_at, released_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(lines)
        .bind(reservation.created_at)
        .bind(reservation.released_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            "SELECT id, lines, created_at, released_at FROM reservations WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_reservation).transpose()
    }

    async fn mark_released(&self, id: ReservationId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET released_at = $2 WHERE id = $1 AND released_at IS NULL",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_active(&self, id: ReservationId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET released_at = NULL WHERE id = $1 AND released_at IS NOT NULL",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CartRepository for PostgresStore {
    async fn get_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT owner_id, items, updated_at FROM carts WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items: serde_json::Value = row.try_get("items")?;
                let items: Vec<CartItem> = serde_json::from_value(items)?;
                Ok(Some(Cart {
                    owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
                    items,
                    updated_at: row.try_get("updated_at")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let items = serde_json::to_value(&cart.items)?;

        sqlx::query(
            r#"
            INSERT INTO carts (owner_id, items, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id) DO UPDATE SET
                items = EXCLUDED.items,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.owner_id.as_uuid())
        .bind(items)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let items = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, owner_id, items, status, reservation_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.owner_id.as_uuid())
        .bind(items)
        .bind(order.status.as_str())
        .bind(order.reservation_id.as_uuid())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(new.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }
}
