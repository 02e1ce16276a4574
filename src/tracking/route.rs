//! Route/ETA seam.
//!
//! Directions come from an external mapping service. The poller only needs
//! "how long from the supervisor's last fix to the store", so the service is
//! reduced to one async call.

use async_trait::async_trait;

use crate::models::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub distance_m: f64,
    pub duration_secs: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("No route between points")]
    NoRoute,
}

#[async_trait]
pub trait RouteEstimator: Send + Sync + 'static {
    async fn estimate(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteEstimate, RouteError>;
}

/// Great-circle distance at a fixed average speed. Used when no mapping
/// service is configured.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineEstimator {
    pub speed_kmh: f64,
}

impl Default for StraightLineEstimator {
    fn default() -> Self {
        Self { speed_kmh: 30.0 }
    }
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[async_trait]
impl RouteEstimator for StraightLineEstimator {
    async fn estimate(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteEstimate, RouteError> {
        if !(self.speed_kmh.is_finite() && self.speed_kmh > 0.0) {
            return Err(RouteError::NoRoute);
        }
        let distance_m = haversine_m(from, to);
        Ok(RouteEstimate {
            distance_m,
            duration_secs: distance_m / (self.speed_kmh * 1000.0 / 3600.0),
        })
    }
}

/// `"N min"` under an hour, `"H h M min"` otherwise. Minutes are rounded.
pub fn format_duration(seconds: f64) -> String {
    let minutes = if seconds.is_finite() && seconds > 0.0 {
        (seconds / 60.0).round() as u64
    } else {
        0
    };
    if minutes < 60 {
        format!("{minutes} min")
    } else {
        format!("{} h {} min", minutes / 60, minutes % 60)
    }
}
