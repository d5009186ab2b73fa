mod response;

use tracing::debug;

pub use response::Route;

use crate::error::{AppError, RouteFailure};
use crate::models::booking::GeoPoint;

/// Fetches driving routes for one trip leg at a time; owned exclusively
/// by a single trip, which serializes all access.
pub struct RouteCalculator {
    client: reqwest::Client,
    base_url: String,
    route: Option<Route>,
}

impl RouteCalculator {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            route: None,
        }
    }

    /// Requests a route for the leg and replaces the current one; on any
    /// failure the stale route is cleared.
    pub async fn fetch_route(
        &mut self,
        start: GeoPoint,
        end: GeoPoint,
    ) -> Result<&Route, AppError> {
        self.route = None;

        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, start.lng, start.lat, end.lng, end.lat
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| AppError::RouteUnavailable(RouteFailure::Transport(err.to_string())))?;

        let body: response::DirectionsResponse = response
            .json()
            .await
            .map_err(|err| AppError::RouteUnavailable(RouteFailure::Transport(err.to_string())))?;

        let route = response::into_route(body).map_err(AppError::RouteUnavailable)?;

        debug!(
            distance = %route.distance_label(),
            eta = %route.eta_label(),
            waypoints = route.waypoints.len(),
            "route fetched"
        );

        Ok(self.route.insert(route))
    }

    pub fn clear_route(&mut self) {
        self.route = None;
    }

    pub fn current(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn distance_label(&self) -> String {
        self.route
            .as_ref()
            .map(Route::distance_label)
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn eta_label(&self) -> String {
        self.route
            .as_ref()
            .map(Route::eta_label)
            .unwrap_or_else(|| "N/A".to_string())
    }
}
