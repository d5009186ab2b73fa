use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus, GeoPoint, Place};
use crate::state::AppState;
use crate::store::{BookingStore, NewBooking};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/pending", get(list_pending))
        .route("/bookings/history", get(history))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/bookings/:id/rider-location", patch(update_rider_location))
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub rider_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
}

#[derive(Deserialize)]
pub struct RiderLocationRequest {
    pub location: GeoPoint,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    if payload.pickup.name.trim().is_empty() || payload.dropoff.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "pickup and dropoff names cannot be empty".to_string(),
        ));
    }

    let booking = state
        .store
        .create(NewBooking {
            rider_id: payload.rider_id,
            pickup: payload.pickup,
            dropoff: payload.dropoff,
        })
        .await?;

    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.store.get(id).await?))
}

async fn list_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.store.list_pending().await?))
}

async fn history(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.store.history().await?))
}

/// Rider-side cancel, valid until pickup.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let current = state.store.get(id).await?;
    if current.status == BookingStatus::PickedUp {
        return Err(AppError::ClaimConflict(
            "rider is already picked up; only the driver can end the trip".to_string(),
        ));
    }

    let booking = state.store.cancel(id).await?;
    state
        .metrics
        .trip_transitions_total
        .with_label_values(&["cancelled"])
        .inc();

    Ok(Json(booking))
}

async fn update_rider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RiderLocationRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(
        state.store.update_rider_location(id, payload.location).await?,
    ))
}
