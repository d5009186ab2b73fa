mod memory;

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryBookingStore;

use crate::error::AppError;
use crate::models::booking::{Booking, GeoPoint, Place};

/// Claim payload a driver attaches to an accept call.
#[derive(Debug, Clone)]
pub struct DriverClaim {
    pub driver_id: Uuid,
    pub location: Option<GeoPoint>,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub rider_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
}

/// Persistence boundary for bookings. `accept` must behave as a
/// compare-and-swap on `Pending`: of N concurrent claims on one booking,
/// exactly one succeeds.
pub trait BookingStore: Send + Sync + 'static {
    fn create(&self, req: NewBooking) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn list_pending(&self) -> impl Future<Output = Result<Vec<Booking>, AppError>> + Send;

    fn history(&self) -> impl Future<Output = Result<Vec<Booking>, AppError>> + Send;

    fn accept(
        &self,
        id: Uuid,
        claim: DriverClaim,
    ) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn mark_picked_up(
        &self,
        id: Uuid,
        driver_id: Uuid,
    ) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn complete(
        &self,
        id: Uuid,
        driver_id: Uuid,
    ) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn cancel(&self, id: Uuid) -> impl Future<Output = Result<Booking, AppError>> + Send;

    fn update_rider_location(
        &self,
        id: Uuid,
        location: GeoPoint,
    ) -> impl Future<Output = Result<Booking, AppError>> + Send;
}
