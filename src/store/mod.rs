pub mod memory;
pub mod sql;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::order::{NewOrder, Order, OrderStatus};

pub use memory::MemoryOrderStore;
pub use sql::SqlOrderStore;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("order not found")]
    NotFound,

    #[error("order status does not match the expected status")]
    Conflict,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Storage(other.to_string()),
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Order, StoreError>;

    /// Sets `status` to `new` only if it currently equals `expected`, checking
    /// and writing as one atomic backend operation. A status mismatch is
    /// [`StoreError::Conflict`], a missing row [`StoreError::NotFound`].
    async fn conditional_update(
        &self,
        id: i64,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order, StoreError>;

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Order>, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    fn name(&self) -> &'static str;
}
