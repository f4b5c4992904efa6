//! Great-circle distance and geofence checks. Pure functions, no I/O.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Applied when a geofence is enabled but no explicit radius is configured.
pub const DEFAULT_GEOFENCE_RADIUS_M: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Latitude must lie in [-90, 90], longitude in [-180, 180], both finite.
pub fn valid_coordinates(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Haversine distance in meters.
pub fn distance_meters(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// A point exactly on the boundary counts as inside.
pub fn within_geofence(point: Point, center: Point, radius_m: f64) -> bool {
    distance_meters(point, center) <= radius_m
}
