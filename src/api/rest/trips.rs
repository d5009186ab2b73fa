use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::lifecycle::{RideLifecycleController, RideState, TripView};
use crate::engine::manager::DriverSession;
use crate::engine::slider::SlideOutcome;
use crate::error::AppError;
use crate::models::driver::DriverStatus;
use crate::routing::RouteCalculator;
use crate::state::{AppState, DriverTrip};
use crate::tracking::PermissionState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips/search", post(start_search))
        .route("/trips/:driver_id", get(get_trip).delete(cancel_trip))
        .route("/trips/:driver_id/accept", post(accept_booking))
        .route("/trips/:driver_id/pickup", post(confirm_pickup))
        .route("/trips/:driver_id/dropoff", post(confirm_dropoff))
}

#[derive(Deserialize)]
pub struct StartSearchRequest {
    pub driver_id: Uuid,
    pub token: String,
    pub location_permission: PermissionState,
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub booking_id: Uuid,
}

#[derive(Deserialize)]
pub struct GestureRequest {
    /// Drag progress across the slider track, in [0, 1].
    pub progress: f64,
}

#[derive(Serialize)]
pub struct GestureResponse {
    pub outcome: SlideOutcomeView,
    pub trip: TripView,
}

#[derive(Serialize)]
pub enum SlideOutcomeView {
    Committed,
    SpringBack,
}

impl From<SlideOutcome> for SlideOutcomeView {
    fn from(outcome: SlideOutcome) -> Self {
        match outcome {
            SlideOutcome::Committed => SlideOutcomeView::Committed,
            SlideOutcome::SpringBack => SlideOutcomeView::SpringBack,
        }
    }
}

fn trip_handle(state: &AppState, driver_id: Uuid) -> Result<Arc<Mutex<DriverTrip>>, AppError> {
    state
        .trips
        .get(&driver_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("no active trip for driver {driver_id}")))
}

/// Opens a trip session for an authenticated driver and starts searching.
async fn start_search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartSearchRequest>,
) -> Result<Json<TripView>, AppError> {
    let (registered_token, location) = {
        let driver = state
            .drivers
            .get(&payload.driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", payload.driver_id)))?;
        (driver.token.clone(), driver.location)
    };

    if payload.token.is_empty() || payload.token != registered_token {
        return Err(AppError::Auth("invalid driver token".to_string()));
    }

    let session = DriverSession {
        driver_id: payload.driver_id,
        token: payload.token,
    };
    let route = RouteCalculator::new(state.routing_base_url.clone());
    let mut trip = RideLifecycleController::new(
        state.store.clone(),
        session,
        route,
        state.min_move_m,
        payload.location_permission,
    );

    // Seed the tracker with the registered position.
    trip.push_location(location).await;
    trip.begin_search().await?;
    let view = trip.view();

    match state.trips.entry(payload.driver_id) {
        Entry::Occupied(_) => {
            return Err(AppError::ClaimConflict(format!(
                "driver {} already has an active trip session",
                payload.driver_id
            )));
        }
        Entry::Vacant(slot) => {
            slot.insert(Arc::new(Mutex::new(trip)));
        }
    }
    state.metrics.active_trips.set(state.trips.len() as i64);

    Ok(Json(view))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<TripView>, AppError> {
    let handle = trip_handle(&state, driver_id)?;
    let mut trip = handle.lock().await;

    // A poll while searching is the pending refresh tick.
    if trip.state() == RideState::Searching {
        let _ = trip.refresh_pending().await;
    }

    Ok(Json(trip.view()))
}

async fn accept_booking(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<Uuid>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<TripView>, AppError> {
    let handle = trip_handle(&state, driver_id)?;
    let mut trip = handle.lock().await;

    let start = Instant::now();
    let result = trip.accept(payload.booking_id).await;
    let elapsed = start.elapsed().as_secs_f64();

    let outcome = match &result {
        Ok(()) => "success",
        Err(AppError::ClaimConflict(_)) => "conflict",
        Err(_) => "error",
    };
    state
        .metrics
        .claims_total
        .with_label_values(&[outcome])
        .inc();
    state
        .metrics
        .claim_latency_seconds
        .with_label_values(&[outcome])
        .observe(elapsed);

    result?;

    if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
        driver.status = DriverStatus::OnTrip;
        driver.updated_at = Utc::now();
    }

    Ok(Json(trip.view()))
}

async fn confirm_pickup(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<Uuid>,
    Json(payload): Json<GestureRequest>,
) -> Result<Json<GestureResponse>, AppError> {
    let handle = trip_handle(&state, driver_id)?;
    let mut trip = handle.lock().await;

    let outcome = trip.confirm_pickup(payload.progress).await?;
    if outcome == SlideOutcome::Committed {
        state
            .metrics
            .trip_transitions_total
            .with_label_values(&["picked_up"])
            .inc();
    }

    Ok(Json(GestureResponse {
        outcome: outcome.into(),
        trip: trip.view(),
    }))
}

async fn confirm_dropoff(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<Uuid>,
    Json(payload): Json<GestureRequest>,
) -> Result<Json<GestureResponse>, AppError> {
    let handle = trip_handle(&state, driver_id)?;
    let mut trip = handle.lock().await;

    let outcome = trip.confirm_dropoff(payload.progress).await?;
    if outcome == SlideOutcome::Committed {
        state
            .metrics
            .trip_transitions_total
            .with_label_values(&["completed"])
            .inc();

        if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
            driver.status = DriverStatus::Available;
            driver.updated_at = Utc::now();
        }
    }

    Ok(Json(GestureResponse {
        outcome: outcome.into(),
        trip: trip.view(),
    }))
}

/// Closes the trip session and releases its route and location feed.
async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<TripView>, AppError> {
    let handle = trip_handle(&state, driver_id)?;
    let view = {
        let mut trip = handle.lock().await;
        if !trip.state().is_terminal() {
            trip.cancel().await?;
        }
        trip.view()
    };

    state.trips.remove(&driver_id);
    state.metrics.active_trips.set(state.trips.len() as i64);

    if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
        driver.status = DriverStatus::Available;
        driver.updated_at = Utc::now();
    }

    Ok(Json(view))
}
