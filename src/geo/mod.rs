use crate::models::order::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub const MAX_LATITUDE: f64 = 90.0;
pub const MAX_LONGITUDE: f64 = 180.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn parse_point(raw: &[String]) -> Result<GeoPoint, String> {
    let [lat, lng] = raw else {
        return Err(format!(
            "location must contain exactly 2 values, got {}",
            raw.len()
        ));
    };

    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("latitude {lat:?} is not a number"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| format!("longitude {lng:?} is not a number"))?;

    if !lat.is_finite() || lat.abs() > MAX_LATITUDE {
        return Err(format!("latitude {lat} out of range"));
    }
    if !lng.is_finite() || lng.abs() > MAX_LONGITUDE {
        return Err(format!("longitude {lng} out of range"));
    }

    Ok(GeoPoint { lat, lng })
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, parse_point};
    use crate::models::order::GeoPoint;

    fn pair(lat: &str, lng: &str) -> Vec<String> {
        vec![lat.to_string(), lng.to_string()]
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 22.286681,
            lng: 114.19326,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn parses_valid_pair() {
        let point = parse_point(&pair("22.286681", "114.193260")).unwrap();
        assert_eq!(point.lat, 22.286681);
        assert_eq!(point.lng, 114.19326);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(parse_point(&[]).is_err());
        assert!(
            parse_point(&[
                "22.28".to_string(),
                "114.19".to_string(),
                "114.19".to_string()
            ])
            .is_err()
        );
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert!(parse_point(&pair("a", "b")).is_err());
        assert!(parse_point(&pair("NaN", "10")).is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(parse_point(&pair("9999999", "-99999999")).is_err());
        assert!(parse_point(&pair("90.0001", "0")).is_err());
        assert!(parse_point(&pair("0", "-180.5")).is_err());
        assert!(parse_point(&pair("-90", "180")).is_ok());
    }
}
