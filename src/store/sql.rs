use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::models::order::{GeoPoint, NewOrder, Order, OrderStatus};
use crate::store::{OrderStore, StoreError};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    origin_lat REAL NOT NULL,
    origin_lng REAL NOT NULL,
    destination_lat REAL NOT NULL,
    destination_lng REAL NOT NULL,
    status VARCHAR(20) NOT NULL CHECK (status IN ('UNASSIGNED', 'TAKEN')),
    distance INTEGER NOT NULL CHECK (distance >= 0)
)
"#;

const COLUMNS: &str =
    "id, origin_lat, origin_lng, destination_lat, destination_lng, distance, status";

#[derive(Clone)]
pub struct SqlOrderStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    origin_lat: f64,
    origin_lng: f64,
    destination_lat: f64,
    destination_lng: f64,
    distance: i64,
    status: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let distance = u32::try_from(row.distance).map_err(|_| {
            StoreError::Storage(format!("order {} has invalid distance {}", row.id, row.distance))
        })?;
        let status = OrderStatus::from_str(&row.status).map_err(StoreError::Storage)?;

        Ok(Order {
            id: row.id,
            origin: GeoPoint {
                lat: row.origin_lat,
                lng: row.origin_lng,
            },
            destination: GeoPoint {
                lat: row.destination_lat,
                lng: row.destination_lng,
            },
            distance,
            status,
        })
    }
}

impl SqlOrderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        info!(max_connections, "connected to order database");
        Ok(store)
    }

    // Every sqlite memory connection is its own database, so the pool holds
    // exactly one that never expires.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_optional(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {COLUMNS} FROM orders WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }
}

#[async_trait]
impl OrderStore for SqlOrderStore {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let status = OrderStatus::Unassigned;
        let result = sqlx::query(
            "INSERT INTO orders (origin_lat, origin_lng, destination_lat, destination_lng, distance, status) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(order.origin.lat)
        .bind(order.origin.lng)
        .bind(order.destination.lat)
        .bind(order.destination.lng)
        .bind(i64::from(order.distance))
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(order_id = id, distance = order.distance, "order inserted");

        Ok(Order {
            id,
            origin: order.origin,
            destination: order.destination,
            distance: order.distance,
            status,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Order, StoreError> {
        self.fetch_optional(id).await?.ok_or(StoreError::NotFound)
    }

    async fn conditional_update(
        &self,
        id: i64,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order, StoreError> {
        let updated: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET status = ? WHERE id = ? AND status = ? RETURNING {COLUMNS}"
        ))
        .bind(new.as_str())
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Order::try_from(row);
        }

        // Zero rows: tell a missing order apart from a status mismatch.
        match self.fetch_optional(id).await? {
            Some(current) => {
                debug!(order_id = id, current = %current.status, %expected, "conditional update lost");
                Err(StoreError::Conflict)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM orders ORDER BY id ASC LIMIT ? OFFSET ?"))
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    fn name(&self) -> &'static str {
        "sql"
    }
}
