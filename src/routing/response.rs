use serde::Deserialize;

use crate::error::RouteFailure;
use crate::models::booking::GeoPoint;

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub waypoints: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl Route {
    pub fn distance_label(&self) -> String {
        format!("{:.2} km", self.distance_m / 1_000.0)
    }

    pub fn eta_label(&self) -> String {
        format!("{} min", (self.duration_s / 60.0).round() as i64)
    }
}

#[derive(Deserialize)]
pub(super) struct DirectionsResponse {
    pub(super) code: String,
    #[serde(default)]
    pub(super) routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
pub(super) struct DirectionsRoute {
    pub(super) distance: f64,
    pub(super) duration: f64,
    pub(super) geometry: Geometry,
}

#[derive(Deserialize)]
pub(super) struct Geometry {
    /// GeoJSON order: [lng, lat].
    pub(super) coordinates: Vec<[f64; 2]>,
}

pub(super) fn into_route(response: DirectionsResponse) -> Result<Route, RouteFailure> {
    if response.code != "Ok" {
        return Err(RouteFailure::NoRoute);
    }

    let best = response.routes.into_iter().next().ok_or(RouteFailure::NoRoute)?;
    if best.geometry.coordinates.is_empty() {
        return Err(RouteFailure::NoRoute);
    }

    let waypoints = best
        .geometry
        .coordinates
        .iter()
        .map(|pair| GeoPoint {
            lat: pair[1],
            lng: pair[0],
        })
        .collect();

    Ok(Route {
        waypoints,
        distance_m: best.distance,
        duration_s: best.duration,
    })
}

#[cfg(test)]
mod tests {
    use super::{into_route, DirectionsResponse};
    use crate::error::RouteFailure;

    fn parse(raw: &str) -> DirectionsResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn successful_response_becomes_a_route() {
        let response = parse(
            r#"{
                "code": "Ok",
                "routes": [{
                    "distance": 3417.6,
                    "duration": 512.3,
                    "geometry": { "coordinates": [[124.63, 8.48], [124.64, 8.49]] }
                }]
            }"#,
        );

        let route = into_route(response).unwrap();
        assert_eq!(route.waypoints.len(), 2);
        assert!((route.waypoints[0].lat - 8.48).abs() < 1e-9);
        assert!((route.waypoints[0].lng - 124.63).abs() < 1e-9);
        assert_eq!(route.distance_label(), "3.42 km");
        assert_eq!(route.eta_label(), "9 min");
    }

    #[test]
    fn non_ok_code_is_no_route() {
        let response = parse(r#"{ "code": "NoRoute", "routes": [] }"#);
        assert_eq!(into_route(response).unwrap_err(), RouteFailure::NoRoute);
    }

    #[test]
    fn empty_route_list_is_no_route() {
        let response = parse(r#"{ "code": "Ok", "routes": [] }"#);
        assert_eq!(into_route(response).unwrap_err(), RouteFailure::NoRoute);
    }
}
