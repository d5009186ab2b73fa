use crate::models::booking::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Nominal city driving speed for the rough pending-list ETA.
const ESTIMATE_SPEED_KMH: f64 = 30.0;

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

pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_km(a, b) * 1_000.0
}

/// Straight-line estimate for a booking card before any route exists.
pub fn straight_line_estimate(a: &GeoPoint, b: &GeoPoint) -> (String, String) {
    let km = haversine_km(a, b);
    let minutes = (km / ESTIMATE_SPEED_KMH * 60.0).round().max(1.0) as i64;
    (format!("{km:.2} km"), format!("{minutes} min"))
}
