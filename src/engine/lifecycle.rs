use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::manager::{BookingManager, DriverSession, PendingBookingView};
use crate::engine::slider::{SlideOutcome, SlideToConfirm};
use crate::error::AppError;
use crate::models::booking::{Booking, GeoPoint};
use crate::routing::RouteCalculator;
use crate::store::BookingStore;
use crate::tracking::{LocationTracker, PermissionState};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RideState {
    Idle,
    Searching,
    EnRouteToPickup,
    EnRouteToDestination,
    Completed,
    Cancelled,
}

impl RideState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideState::Completed | RideState::Cancelled)
    }
}

/// Snapshot handed to the driver UI on every poll.
#[derive(Debug, Clone, Serialize)]
pub struct TripView {
    pub state: RideState,
    pub booking_id: Option<Uuid>,
    pub distance: String,
    pub eta: String,
    pub location_available: bool,
    pub pending: Vec<PendingBookingView>,
}

/// Drives one driver's trip from search to completion; exclusive `&mut`
/// access serializes every transition.
pub struct RideLifecycleController<S> {
    driver_id: Uuid,
    state: RideState,
    booking: Option<Booking>,
    manager: BookingManager<S>,
    store: Arc<S>,
    route: RouteCalculator,
    tracker: LocationTracker,
    slider: SlideToConfirm,
    location_available: bool,
}

impl<S: BookingStore> RideLifecycleController<S> {
    /// A denied location permission degrades the trip rather than failing
    /// construction.
    pub fn new(
        store: Arc<S>,
        session: DriverSession,
        route: RouteCalculator,
        min_move_m: f64,
        permission: PermissionState,
    ) -> Self {
        let driver_id = session.driver_id;
        let mut tracker = LocationTracker::new(min_move_m);
        let location_available = match tracker.start(permission) {
            Ok(_rx) => true,
            Err(_) => {
                warn!(driver_id = %driver_id, "location permission denied; tracking disabled");
                false
            }
        };

        Self {
            driver_id,
            state: RideState::Idle,
            booking: None,
            manager: BookingManager::new(store.clone(), Some(session)),
            store,
            route,
            tracker,
            slider: SlideToConfirm::new(),
            location_available,
        }
    }

    pub fn state(&self) -> RideState {
        self.state
    }

    pub fn driver_id(&self) -> Uuid {
        self.driver_id
    }

    pub fn booking(&self) -> Option<&Booking> {
        self.booking.as_ref()
    }

    pub fn view(&self) -> TripView {
        TripView {
            state: self.state,
            booking_id: self.booking.as_ref().map(|booking| booking.id),
            distance: self.route.distance_label(),
            eta: self.route.eta_label(),
            location_available: self.location_available,
            pending: self.manager.pending().to_vec(),
        }
    }

    pub async fn begin_search(&mut self) -> Result<(), AppError> {
        if self.state != RideState::Idle {
            return Err(AppError::BadRequest(format!(
                "cannot begin search in state {:?}",
                self.state
            )));
        }

        self.state = RideState::Searching;
        self.manager.refresh_pending().await;

        Ok(())
    }

    pub async fn refresh_pending(&mut self) -> Result<(), AppError> {
        if self.state != RideState::Searching {
            return Err(AppError::BadRequest(format!(
                "not searching (state {:?})",
                self.state
            )));
        }

        self.manager.refresh_pending().await;
        Ok(())
    }

    /// Claims a booking. A lost race stays in `Searching` with a fresh
    /// pending list.
    pub async fn accept(&mut self, booking_id: Uuid) -> Result<(), AppError> {
        if self.state != RideState::Searching {
            return Err(AppError::BadRequest(format!(
                "cannot accept in state {:?}",
                self.state
            )));
        }

        match self.manager.accept(booking_id, self.tracker.current()).await {
            Ok(booking) => {
                info!(booking_id = %booking.id, driver_id = %self.driver_id, "claim confirmed");
                self.booking = Some(booking);
                self.state = RideState::EnRouteToPickup;
                self.slider.reset();
                self.refresh_leg_route().await;
                Ok(())
            }
            Err(err @ AppError::ClaimConflict(_)) => {
                self.manager.refresh_pending().await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Pickup confirmation gesture; on commit the route flips to the
    /// pickup→dropoff leg.
    pub async fn confirm_pickup(&mut self, progress: f64) -> Result<SlideOutcome, AppError> {
        if self.state != RideState::EnRouteToPickup {
            return Err(AppError::BadRequest(format!(
                "cannot confirm pickup in state {:?}",
                self.state
            )));
        }

        self.slider.drag(progress);
        if self.slider.release() == SlideOutcome::SpringBack {
            return Ok(SlideOutcome::SpringBack);
        }

        let booking_id = self.active_booking_id()?;
        match self.store.mark_picked_up(booking_id, self.driver_id).await {
            Ok(booking) => {
                info!(booking_id = %booking.id, "rider picked up");
                self.booking = Some(booking);
                self.state = RideState::EnRouteToDestination;
                self.slider.reset();
                self.route.clear_route();
                self.refresh_leg_route().await;
                Ok(SlideOutcome::Committed)
            }
            Err(err) => {
                self.reconcile_failed_transition(err).await
            }
        }
    }

    /// Drop-off confirmation gesture, same contract as pickup.
    pub async fn confirm_dropoff(&mut self, progress: f64) -> Result<SlideOutcome, AppError> {
        if self.state != RideState::EnRouteToDestination {
            return Err(AppError::BadRequest(format!(
                "cannot confirm drop-off in state {:?}",
                self.state
            )));
        }

        self.slider.drag(progress);
        if self.slider.release() == SlideOutcome::SpringBack {
            return Ok(SlideOutcome::SpringBack);
        }

        let booking_id = self.active_booking_id()?;
        match self.store.complete(booking_id, self.driver_id).await {
            Ok(booking) => {
                info!(booking_id = %booking.id, "trip completed");
                self.booking = Some(booking);
                self.state = RideState::Completed;
                self.route.clear_route();
                self.tracker.stop();
                Ok(SlideOutcome::Committed)
            }
            Err(err) => {
                self.reconcile_failed_transition(err).await
            }
        }
    }

    /// Explicit cancel from any non-terminal state.
    pub async fn cancel(&mut self) -> Result<(), AppError> {
        if self.state.is_terminal() {
            return Err(AppError::BadRequest(format!(
                "trip already {:?}",
                self.state
            )));
        }

        if let Some(booking) = &self.booking {
            if !booking.status.is_terminal() {
                match self.store.cancel(booking.id).await {
                    Ok(_) | Err(AppError::InvalidTransition { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
        }

        info!(driver_id = %self.driver_id, "trip cancelled");
        self.state = RideState::Cancelled;
        self.route.clear_route();
        self.tracker.stop();

        Ok(())
    }

    /// Feeds a raw position sample; a published fix refreshes the active
    /// leg's route.
    pub async fn push_location(&mut self, point: GeoPoint) {
        let published = self.tracker.push(point);
        let en_route = matches!(
            self.state,
            RideState::EnRouteToPickup | RideState::EnRouteToDestination
        );

        if published && en_route {
            self.refresh_leg_route().await;
        }
    }

    pub fn is_location_available(&self) -> bool {
        self.location_available
    }

    fn active_booking_id(&self) -> Result<Uuid, AppError> {
        self.booking
            .as_ref()
            .map(|booking| booking.id)
            .ok_or_else(|| AppError::Internal("no active booking".to_string()))
    }

    /// The booking slipped away mid-trip: drop back to `Searching`.
    async fn reconcile_failed_transition(
        &mut self,
        err: AppError,
    ) -> Result<SlideOutcome, AppError> {
        self.slider.reset();

        match err {
            AppError::ClaimConflict(_) | AppError::InvalidTransition { .. } => {
                warn!(driver_id = %self.driver_id, error = %err, "booking lost mid-trip");
                self.booking = None;
                self.route.clear_route();
                self.state = RideState::Searching;
                self.manager.refresh_pending().await;
                Err(AppError::ClaimConflict(
                    "booking is no longer active".to_string(),
                ))
            }
            other => Err(other),
        }
    }

    /// Recomputes the active leg's route from the latest fix; failures
    /// leave the labels at "N/A".
    async fn refresh_leg_route(&mut self) {
        let Some(booking) = &self.booking else {
            return;
        };

        let end = match self.state {
            RideState::EnRouteToPickup => booking.pickup.point,
            RideState::EnRouteToDestination => booking.dropoff.point,
            _ => return,
        };

        let Some(start) = self.tracker.current() else {
            self.route.clear_route();
            return;
        };

        if let Err(err) = self.route.fetch_route(start, end).await {
            warn!(booking_id = %booking.id, error = %err, "route fetch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{RideLifecycleController, RideState};
    use crate::engine::manager::DriverSession;
    use crate::engine::slider::SlideOutcome;
    use crate::error::AppError;
    use crate::models::booking::{BookingStatus, GeoPoint, Place};
    use crate::routing::RouteCalculator;
    use crate::store::{BookingStore, InMemoryBookingStore, NewBooking};
    use crate::tracking::PermissionState;

    fn controller(
        store: Arc<InMemoryBookingStore>,
        permission: PermissionState,
    ) -> RideLifecycleController<InMemoryBookingStore> {
        let session = DriverSession {
            driver_id: Uuid::new_v4(),
            token: Uuid::new_v4().to_string(),
        };
        // Discard port: route fetches fail fast and the labels stay "N/A".
        let route = RouteCalculator::new("http://127.0.0.1:9".to_string());

        RideLifecycleController::new(store, session, route, 25.0, permission)
    }

    async fn seeded_store() -> (Arc<InMemoryBookingStore>, Uuid) {
        let store = Arc::new(InMemoryBookingStore::new(16));
        let booking = store
            .create(NewBooking {
                rider_id: Uuid::new_v4(),
                pickup: Place {
                    name: "Divisoria".to_string(),
                    point: GeoPoint { lat: 8.48, lng: 124.63 },
                },
                dropoff: Place {
                    name: "Limketkai".to_string(),
                    point: GeoPoint { lat: 8.49, lng: 124.64 },
                },
            })
            .await
            .unwrap();

        (store, booking.id)
    }

    #[tokio::test]
    async fn search_surfaces_pending_bookings() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store, PermissionState::Granted);

        trip.begin_search().await.unwrap();

        assert_eq!(trip.state(), RideState::Searching);
        let view = trip.view();
        assert_eq!(view.pending.len(), 1);
        assert_eq!(view.pending[0].booking_id, booking_id);
    }

    #[tokio::test]
    async fn accept_moves_to_en_route_to_pickup() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store.clone(), PermissionState::Granted);
        trip.begin_search().await.unwrap();

        trip.accept(booking_id).await.unwrap();

        assert_eq!(trip.state(), RideState::EnRouteToPickup);
        let stored = store.get(booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Accepted);
        assert_eq!(stored.driver_id, Some(trip.driver_id()));
    }

    #[tokio::test]
    async fn lost_race_returns_to_searching() {
        let (store, booking_id) = seeded_store().await;
        let mut winner = controller(store.clone(), PermissionState::Granted);
        let mut loser = controller(store, PermissionState::Granted);
        winner.begin_search().await.unwrap();
        loser.begin_search().await.unwrap();

        winner.accept(booking_id).await.unwrap();
        let result = loser.accept(booking_id).await;

        assert!(matches!(result, Err(AppError::ClaimConflict(_))));
        assert_eq!(loser.state(), RideState::Searching);
        assert!(loser.view().pending.is_empty());
    }

    #[tokio::test]
    async fn short_pickup_drag_springs_back() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store.clone(), PermissionState::Granted);
        trip.begin_search().await.unwrap();
        trip.accept(booking_id).await.unwrap();

        let outcome = trip.confirm_pickup(0.5).await.unwrap();

        assert_eq!(outcome, SlideOutcome::SpringBack);
        assert_eq!(trip.state(), RideState::EnRouteToPickup);
        let stored = store.get(booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Accepted);
    }

    #[tokio::test]
    async fn committed_pickup_switches_leg() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store.clone(), PermissionState::Granted);
        trip.begin_search().await.unwrap();
        trip.accept(booking_id).await.unwrap();

        let outcome = trip.confirm_pickup(0.8).await.unwrap();

        assert_eq!(outcome, SlideOutcome::Committed);
        assert_eq!(trip.state(), RideState::EnRouteToDestination);
        let stored = store.get(booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::PickedUp);
    }

    #[tokio::test]
    async fn committed_dropoff_completes_the_trip() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store.clone(), PermissionState::Granted);
        trip.begin_search().await.unwrap();
        trip.accept(booking_id).await.unwrap();
        trip.confirm_pickup(0.9).await.unwrap();

        let outcome = trip.confirm_dropoff(0.75).await.unwrap();

        assert_eq!(outcome, SlideOutcome::Committed);
        assert_eq!(trip.state(), RideState::Completed);
        let stored = store.get(booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Completed);

        // Terminal: no further transitions.
        assert!(trip.cancel().await.is_err());
        assert!(trip.confirm_dropoff(1.0).await.is_err());
    }

    #[tokio::test]
    async fn cancel_releases_route_and_tracking() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store.clone(), PermissionState::Granted);
        trip.begin_search().await.unwrap();
        trip.accept(booking_id).await.unwrap();

        trip.cancel().await.unwrap();

        assert_eq!(trip.state(), RideState::Cancelled);
        let view = trip.view();
        assert_eq!(view.distance, "N/A");
        assert_eq!(view.eta, "N/A");
        let stored = store.get(booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn rider_cancel_mid_trip_drops_driver_back_to_searching() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store.clone(), PermissionState::Granted);
        trip.begin_search().await.unwrap();
        trip.accept(booking_id).await.unwrap();

        // Rider cancels while the driver is en route to pickup.
        store.cancel(booking_id).await.unwrap();

        let result = trip.confirm_pickup(0.9).await;

        assert!(matches!(result, Err(AppError::ClaimConflict(_))));
        assert_eq!(trip.state(), RideState::Searching);
        assert!(trip.booking().is_none());
    }

    #[tokio::test]
    async fn denied_permission_degrades_but_never_blocks() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store, PermissionState::Denied);

        assert!(!trip.is_location_available());

        trip.begin_search().await.unwrap();
        trip.accept(booking_id).await.unwrap();
        assert_eq!(trip.state(), RideState::EnRouteToPickup);

        let view = trip.view();
        assert!(!view.location_available);
        assert_eq!(view.distance, "N/A");
        assert_eq!(view.eta, "N/A");

        trip.confirm_pickup(0.8).await.unwrap();
        trip.confirm_dropoff(0.8).await.unwrap();
        assert_eq!(trip.state(), RideState::Completed);
    }

    #[tokio::test]
    async fn accept_outside_searching_is_rejected() {
        let (store, booking_id) = seeded_store().await;
        let mut trip = controller(store, PermissionState::Granted);

        let result = trip.accept(booking_id).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
