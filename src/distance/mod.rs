pub mod google;
pub mod haversine;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::order::GeoPoint;

pub use google::GoogleDistanceMatrix;
pub use haversine::HaversineDistance;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DistanceError {
    #[error("no route between the given locations")]
    Unresolvable,

    #[error("distance backend failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait DistanceCalculator: Send + Sync {
    async fn distance(&self, origin: &GeoPoint, destination: &GeoPoint)
    -> Result<u32, DistanceError>;

    fn name(&self) -> &'static str;
}
