use std::sync::Arc;

use crate::distance::DistanceCalculator;
use crate::engine::lifecycle::OrderLifecycle;
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

pub struct AppState {
    pub orders: OrderLifecycle,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, distance: Arc<dyn DistanceCalculator>) -> Self {
        let metrics = Metrics::new();

        Self {
            orders: OrderLifecycle::new(store, distance, metrics.clone()),
            metrics,
        }
    }
}
