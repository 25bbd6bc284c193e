//! Geo collaborator: distance, ETA, and routing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::GeoPoint;
use crate::error::GeoError;

/// A driving route between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub waypoints: Vec<GeoPoint>,
    pub distance_km: f64,
}

#[async_trait]
pub trait GeoService: Send + Sync {
    /// Distance in km between two points. Road-aware backends may return
    /// more than the great-circle distance.
    async fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> Result<f64, GeoError>;

    /// Travel time in minutes for the given vehicle type.
    async fn eta_minutes(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        vehicle_type: &str,
    ) -> Result<u32, GeoError>;

    async fn driving_route(&self, from: GeoPoint, to: GeoPoint) -> Result<Route, GeoError>;
}

/// Straight-line geo service: haversine distance and fixed average speeds.
#[derive(Debug, Clone, Default)]
pub struct HaversineGeo;

impl HaversineGeo {
    pub fn new() -> Self {
        Self
    }

    /// Average urban speed in km/h.
    fn average_speed_kmh(vehicle_type: &str) -> Option<f64> {
        match vehicle_type.to_ascii_lowercase().as_str() {
            "car" | "van" | "truck" => Some(25.0),
            "motorcycle" | "scooter" => Some(30.0),
            "bicycle" | "bike" => Some(12.0),
            "foot" | "walking" => Some(5.0),
            _ => None,
        }
    }
}

fn check(p: GeoPoint) -> Result<GeoPoint, GeoError> {
    if p.is_valid() {
        Ok(p)
    } else {
        Err(GeoError::InvalidCoordinates {
            latitude: p.latitude,
            longitude: p.longitude,
        })
    }
}

#[async_trait]
impl GeoService for HaversineGeo {
    async fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> Result<f64, GeoError> {
        let (from, to) = (check(from)?, check(to)?);
        Ok(from.distance_km(&to))
    }

    async fn eta_minutes(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        vehicle_type: &str,
    ) -> Result<u32, GeoError> {
        let (from, to) = (check(from)?, check(to)?);
        let speed = Self::average_speed_kmh(vehicle_type)
            .ok_or_else(|| GeoError::UnsupportedVehicle(vehicle_type.to_string()))?;
        let minutes = from.distance_km(&to) / speed * 60.0;
        Ok(minutes.ceil() as u32)
    }

    async fn driving_route(&self, from: GeoPoint, to: GeoPoint) -> Result<Route, GeoError> {
        let (from, to) = (check(from)?, check(to)?);
        Ok(Route {
            waypoints: vec![from, to],
            distance_km: from.distance_km(&to),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eta_depends_on_vehicle() {
        let geo = HaversineGeo::new();
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.1, 0.0); // ~11.1 km

        let moto = geo.eta_minutes(a, b, "motorcycle").await.unwrap();
        let bike = geo.eta_minutes(a, b, "bicycle").await.unwrap();
        assert_eq!(moto, 23);
        assert_eq!(bike, 56);
    }

    #[tokio::test]
    async fn eta_rejects_unknown_vehicle() {
        let geo = HaversineGeo::new();
        let p = GeoPoint::new(6.5, 3.4);
        let err = geo.eta_minutes(p, p, "hovercraft").await.unwrap_err();
        assert!(matches!(err, GeoError::UnsupportedVehicle(_)));
    }

    #[tokio::test]
    async fn route_is_straight_line() {
        let geo = HaversineGeo::new();
        let a = GeoPoint::new(6.45, 3.39);
        let b = GeoPoint::new(6.60, 3.35);
        let route = geo.driving_route(a, b).await.unwrap();
        assert_eq!(route.waypoints, vec![a, b]);
        assert!((route.distance_km - geo.distance_km(a, b).await.unwrap()).abs() < 1e-9);

        let err = geo
            .driving_route(a, GeoPoint::new(95.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidCoordinates { .. }));
    }

    #[tokio::test]
    async fn distance_rejects_invalid_coordinates() {
        let geo = HaversineGeo::new();
        let err = geo
            .distance_km(GeoPoint::new(6.5, 3.4), GeoPoint::new(0.0, 181.0))
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidCoordinates { .. }));
    }
}
