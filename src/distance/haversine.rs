use async_trait::async_trait;

use crate::distance::{DistanceCalculator, DistanceError};
use crate::geo::haversine_km;
use crate::models::order::GeoPoint;

#[derive(Debug, Clone)]
pub struct HaversineDistance {
    max_km: f64,
}

impl HaversineDistance {
    pub fn new(max_km: f64) -> Self {
        Self { max_km }
    }
}

#[async_trait]
impl DistanceCalculator for HaversineDistance {
    async fn distance(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<u32, DistanceError> {
        let km = haversine_km(origin, destination);
        if !km.is_finite() || self.max_km.is_nan() || km > self.max_km {
            return Err(DistanceError::Unresolvable);
        }

        Ok((km * 1_000.0).round() as u32)
    }

    fn name(&self) -> &'static str {
        "haversine"
    }
}
