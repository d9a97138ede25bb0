use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::distance::{DistanceCalculator, DistanceError};
use crate::models::order::{GeoPoint, NewOrder, Order, OrderStatus};
use crate::observability::metrics::Metrics;
use crate::store::{OrderStore, StoreError};

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("cannot calculate distance for given location")]
    CannotCalculateDistance,

    #[error("distance service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("order already taken")]
    AlreadyTaken,

    #[error("order not found")]
    NotFound,

    #[error("order was modified concurrently")]
    Conflict,

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => OrderError::NotFound,
            StoreError::Conflict => OrderError::Conflict,
            StoreError::Storage(msg) => OrderError::StorageFailure(msg),
        }
    }
}

#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    distance: Arc<dyn DistanceCalculator>,
    metrics: Metrics,
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn OrderStore>,
        distance: Arc<dyn DistanceCalculator>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            distance,
            metrics,
        }
    }

    pub async fn place(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Order, OrderError> {
        let distance = match self.resolve_distance(&origin, &destination).await {
            Ok(distance) => distance,
            Err(DistanceError::Unresolvable) => {
                warn!(
                    origin = %origin.to_query(),
                    destination = %destination.to_query(),
                    "cannot calculate distance for location"
                );
                self.record_placement("unresolvable");
                return Err(OrderError::CannotCalculateDistance);
            }
            Err(DistanceError::Transport(msg)) => {
                error!(backend = self.distance.name(), error = %msg, "distance lookup failed");
                self.record_placement("error");
                return Err(OrderError::ServiceUnavailable(msg));
            }
        };

        let order = self
            .store
            .create(NewOrder {
                origin,
                destination,
                distance,
            })
            .await
            .map_err(|err| {
                error!(error = %err, "failed to create order");
                self.record_placement("error");
                OrderError::from(err)
            })?;

        self.record_placement("success");
        info!(order_id = order.id, distance = order.distance, "order placed");
        Ok(order)
    }

    pub async fn take(&self, id: i64) -> Result<Order, OrderError> {
        let order = self.get_by_id(id).await?;
        self.take_order(order).await
    }

    /// Claims an order that the caller already fetched. The status check on
    /// `order` only skips pointless writes; the conditional update decides.
    pub async fn take_order(&self, order: Order) -> Result<Order, OrderError> {
        if order.status != OrderStatus::Unassigned {
            debug!(order_id = order.id, status = %order.status, "order already taken");
            self.record_take("already_taken");
            return Err(OrderError::AlreadyTaken);
        }

        match self
            .store
            .conditional_update(order.id, OrderStatus::Unassigned, OrderStatus::Taken)
            .await
        {
            Ok(updated) => {
                self.record_take("success");
                info!(order_id = updated.id, "order taken");
                Ok(updated)
            }
            Err(StoreError::Conflict) => {
                debug!(order_id = order.id, "order taken by a concurrent request");
                self.record_take("already_taken");
                Err(OrderError::AlreadyTaken)
            }
            Err(err) => {
                error!(order_id = order.id, error = %err, "failed to take order");
                self.record_take("error");
                Err(err.into())
            }
        }
    }

    pub async fn list_orders(&self, offset: u32, limit: u32) -> Result<Vec<Order>, OrderError> {
        self.store.list(offset, limit).await.map_err(|err| {
            error!(offset, limit, error = %err, "failed to list orders");
            OrderError::from(err)
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Order, OrderError> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn distance_name(&self) -> &'static str {
        self.distance.name()
    }

    async fn resolve_distance(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<u32, DistanceError> {
        let start = Instant::now();
        let result = self.distance.distance(origin, destination).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(DistanceError::Unresolvable) => "unresolvable",
            Err(DistanceError::Transport(_)) => "error",
        };
        self.metrics
            .distance_lookup_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    fn record_placement(&self, outcome: &str) {
        self.metrics
            .orders_placed_total
            .with_label_values(&[outcome])
            .inc();
    }

    fn record_take(&self, outcome: &str) {
        self.metrics
            .order_takes_total
            .with_label_values(&[outcome])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::future::join_all;

    use super::{OrderError, OrderLifecycle};
    use crate::distance::{DistanceCalculator, DistanceError};
    use crate::models::order::{GeoPoint, NewOrder, Order, OrderStatus};
    use crate::observability::metrics::Metrics;
    use crate::store::{MemoryOrderStore, OrderStore, StoreError};

    struct FixedDistance(Result<u32, DistanceError>);

    #[async_trait]
    impl DistanceCalculator for FixedDistance {
        async fn distance(&self, _: &GeoPoint, _: &GeoPoint) -> Result<u32, DistanceError> {
            self.0.clone()
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct SpyStore {
        inner: MemoryOrderStore,
        creates: AtomicUsize,
        updates: AtomicUsize,
        fail_writes: bool,
    }

    #[async_trait]
    impl OrderStore for SpyStore {
        async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(StoreError::Storage("disk full".to_string()));
            }
            self.inner.create(order).await
        }

        async fn get_by_id(&self, id: i64) -> Result<Order, StoreError> {
            self.inner.get_by_id(id).await
        }

        async fn conditional_update(
            &self,
            id: i64,
            expected: OrderStatus,
            new: OrderStatus,
        ) -> Result<Order, StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(StoreError::Storage("connection reset".to_string()));
            }
            self.inner.conditional_update(id, expected, new).await
        }

        async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Order>, StoreError> {
            self.inner.list(offset, limit).await
        }

        async fn delete(&self, id: i64) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }

        fn name(&self) -> &'static str {
            "spy"
        }
    }

    fn origin() -> GeoPoint {
        GeoPoint {
            lat: 22.286681,
            lng: 114.19326,
        }
    }

    fn destination() -> GeoPoint {
        GeoPoint {
            lat: 22.279707,
            lng: 114.186301,
        }
    }

    fn lifecycle(
        store: Arc<dyn OrderStore>,
        distance: Result<u32, DistanceError>,
    ) -> OrderLifecycle {
        OrderLifecycle::new(store, Arc::new(FixedDistance(distance)), Metrics::new())
    }

    #[tokio::test]
    async fn place_persists_unassigned_order_with_distance() {
        let service = lifecycle(Arc::new(MemoryOrderStore::new()), Ok(550));

        let order = service.place(origin(), destination()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Unassigned);
        assert_eq!(order.distance, 550);

        let fetched = service.get_by_id(order.id).await.unwrap();
        assert_eq!(fetched.id, order.id);
        assert_eq!(fetched.distance, 550);
        assert_eq!(fetched.status, OrderStatus::Unassigned);
    }

    #[tokio::test]
    async fn unresolvable_distance_creates_nothing() {
        let store = Arc::new(SpyStore::default());
        let service = lifecycle(store.clone(), Err(DistanceError::Unresolvable));

        assert_eq!(
            service.place(origin(), destination()).await,
            Err(OrderError::CannotCalculateDistance)
        );
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
        assert!(service.list_orders(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn distance_transport_failure_is_service_unavailable() {
        let store = Arc::new(SpyStore::default());
        let service = lifecycle(
            store.clone(),
            Err(DistanceError::Transport("timed out".to_string())),
        );

        assert_eq!(
            service.place(origin(), destination()).await,
            Err(OrderError::ServiceUnavailable("timed out".to_string()))
        );
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn storage_failure_on_create_is_surfaced_once() {
        let store = Arc::new(SpyStore {
            fail_writes: true,
            ..Default::default()
        });
        let service = lifecycle(store.clone(), Ok(10));

        assert!(matches!(
            service.place(origin(), destination()).await,
            Err(OrderError::StorageFailure(_))
        ));
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn take_transitions_unassigned_order() {
        let service = lifecycle(Arc::new(MemoryOrderStore::new()), Ok(550));
        let order = service.place(origin(), destination()).await.unwrap();

        let taken = service.take(order.id).await.unwrap();
        assert_eq!(taken.id, order.id);
        assert_eq!(taken.status, OrderStatus::Taken);
    }

    #[tokio::test]
    async fn taking_a_taken_order_skips_the_store() {
        let store = Arc::new(SpyStore::default());
        let service = lifecycle(store.clone(), Ok(550));
        let order = service.place(origin(), destination()).await.unwrap();
        service.take(order.id).await.unwrap();

        for _ in 0..3 {
            assert_eq!(service.take(order.id).await, Err(OrderError::AlreadyTaken));
        }
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_snapshot_loses_to_the_conditional_update() {
        let service = lifecycle(Arc::new(MemoryOrderStore::new()), Ok(550));
        let order = service.place(origin(), destination()).await.unwrap();
        let stale = order.clone();

        service.take_order(order).await.unwrap();

        assert_eq!(stale.status, OrderStatus::Unassigned);
        assert_eq!(service.take_order(stale).await, Err(OrderError::AlreadyTaken));
    }

    #[tokio::test]
    async fn take_unknown_order_is_not_found() {
        let service = lifecycle(Arc::new(MemoryOrderStore::new()), Ok(550));
        assert_eq!(service.take(99).await, Err(OrderError::NotFound));
    }

    #[tokio::test]
    async fn storage_failure_on_take_is_not_already_taken() {
        let store = Arc::new(SpyStore {
            fail_writes: true,
            ..Default::default()
        });
        let order = store
            .inner
            .create(NewOrder {
                origin: origin(),
                destination: destination(),
                distance: 5,
            })
            .await
            .unwrap();
        let service = lifecycle(store.clone(), Ok(5));

        assert!(matches!(
            service.take(order.id).await,
            Err(OrderError::StorageFailure(_))
        ));
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_takes_have_exactly_one_winner() {
        let service = lifecycle(Arc::new(MemoryOrderStore::new()), Ok(550));
        let order = service.place(origin(), destination()).await.unwrap();

        let racers = (0..10).map(|_| {
            let service = service.clone();
            let snapshot = order.clone();
            tokio::spawn(async move { service.take_order(snapshot).await })
        });
        let results: Vec<_> = join_all(racers)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == Err(OrderError::AlreadyTaken))
                .count(),
            9
        );
        assert_eq!(
            service.get_by_id(order.id).await.unwrap().status,
            OrderStatus::Taken
        );
    }

    #[tokio::test]
    async fn outcomes_are_counted() {
        let metrics = Metrics::new();
        let service = OrderLifecycle::new(
            Arc::new(MemoryOrderStore::new()),
            Arc::new(FixedDistance(Ok(1))),
            metrics.clone(),
        );
        let order = service.place(origin(), destination()).await.unwrap();
        service.take(order.id).await.unwrap();
        let _ = service.take(order.id).await;

        let takes = &metrics.order_takes_total;
        assert_eq!(takes.with_label_values(&["success"]).get(), 1);
        assert_eq!(takes.with_label_values(&["already_taken"]).get(), 1);
        assert_eq!(
            metrics
                .orders_placed_total
                .with_label_values(&["success"])
                .get(),
            1
        );
    }
}
