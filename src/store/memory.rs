use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::order::{NewOrder, Order, OrderStatus};
use crate::store::{OrderStore, StoreError};

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<i64, Order>,
    last_id: AtomicI64,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order = Order {
            id,
            origin: order.origin,
            destination: order.destination,
            distance: order.distance,
            status: OrderStatus::Unassigned,
        };

        self.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_by_id(&self, id: i64) -> Result<Order, StoreError> {
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn conditional_update(
        &self,
        id: i64,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut order = self.orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        if order.status != expected {
            return Err(StoreError::Conflict);
        }

        order.status = new;
        Ok(order.clone())
    }

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.id);

        Ok(orders
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.orders.remove(&id).is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
