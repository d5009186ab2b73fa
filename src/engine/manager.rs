use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::straight_line_estimate;
use crate::models::booking::{Booking, GeoPoint};
use crate::store::{BookingStore, DriverClaim};

/// Authenticated driver identity attached to every claim.
#[derive(Debug, Clone)]
pub struct DriverSession {
    pub driver_id: Uuid,
    pub token: String,
}

/// What a driver sees on a claimable booking card.
#[derive(Debug, Clone, Serialize)]
pub struct PendingBookingView {
    pub booking_id: Uuid,
    pub rider_id: Uuid,
    pub pickup_name: String,
    pub dropoff_name: String,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub distance_estimate: String,
    pub eta_estimate: String,
    pub rider_location: Option<GeoPoint>,
}

impl PendingBookingView {
    fn from_booking(booking: &Booking) -> Self {
        let (distance_estimate, eta_estimate) =
            straight_line_estimate(&booking.pickup.point, &booking.dropoff.point);

        Self {
            booking_id: booking.id,
            rider_id: booking.rider_id,
            pickup_name: booking.pickup.name.clone(),
            dropoff_name: booking.dropoff.name.clone(),
            pickup: booking.pickup.point,
            dropoff: booking.dropoff.point,
            distance_estimate,
            eta_estimate,
            rider_location: booking.rider_location,
        }
    }
}

/// Driver-side view over the booking store: the claimable list and the
/// claim protocol. Local state changes only after the store confirms.
pub struct BookingManager<S> {
    store: Arc<S>,
    session: Option<DriverSession>,
    pending: Vec<PendingBookingView>,
}

impl<S: BookingStore> BookingManager<S> {
    pub fn new(store: Arc<S>, session: Option<DriverSession>) -> Self {
        Self {
            store,
            session,
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> &[PendingBookingView] {
        &self.pending
    }

    pub fn driver_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|session| session.driver_id)
    }

    /// Replaces the pending view from the store. A fetch failure keeps the
    /// previous list; the error is logged and the next poll tick retries.
    pub async fn refresh_pending(&mut self) -> &[PendingBookingView] {
        match self.store.list_pending().await {
            Ok(bookings) => {
                self.pending = bookings.iter().map(PendingBookingView::from_booking).collect();
            }
            Err(err) => {
                warn!(error = %err, "pending refresh failed; keeping previous list");
            }
        }

        &self.pending
    }

    /// Sends the claim. The store arbitrates the race; on conflict or
    /// transport failure the local list is left untouched.
    pub async fn accept(
        &mut self,
        booking_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<Booking, AppError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| AppError::Auth("no driver session".to_string()))?;

        if session.token.is_empty() {
            return Err(AppError::Auth("empty session token".to_string()));
        }

        let claim = DriverClaim {
            driver_id: session.driver_id,
            location,
            claimed_at: Utc::now(),
        };

        let booking = self.store.accept(booking_id, claim).await?;

        self.refresh_pending().await;

        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{BookingManager, DriverSession};
    use crate::error::AppError;
    use crate::models::booking::{Booking, GeoPoint, Place};
    use crate::store::{BookingStore, DriverClaim, InMemoryBookingStore, NewBooking};

    fn new_booking() -> NewBooking {
        NewBooking {
            rider_id: Uuid::new_v4(),
            pickup: Place {
                name: "Divisoria".to_string(),
                point: GeoPoint { lat: 8.48, lng: 124.63 },
            },
            dropoff: Place {
                name: "Limketkai".to_string(),
                point: GeoPoint { lat: 8.49, lng: 124.64 },
            },
        }
    }

    fn session() -> DriverSession {
        DriverSession {
            driver_id: Uuid::new_v4(),
            token: Uuid::new_v4().to_string(),
        }
    }

    /// Store wrapper whose list endpoint can be made to fail on demand.
    struct FlakyStore {
        inner: InMemoryBookingStore,
        fail_listing: AtomicBool,
    }

    impl BookingStore for FlakyStore {
        async fn create(&self, req: NewBooking) -> Result<Booking, AppError> {
            self.inner.create(req).await
        }

        async fn get(&self, id: Uuid) -> Result<Booking, AppError> {
            self.inner.get(id).await
        }

        async fn list_pending(&self) -> Result<Vec<Booking>, AppError> {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(AppError::TransientFetch("connection reset".to_string()));
            }
            self.inner.list_pending().await
        }

        async fn history(&self) -> Result<Vec<Booking>, AppError> {
            self.inner.history().await
        }

        async fn accept(&self, id: Uuid, claim: DriverClaim) -> Result<Booking, AppError> {
            self.inner.accept(id, claim).await
        }

        async fn mark_picked_up(&self, id: Uuid, driver_id: Uuid) -> Result<Booking, AppError> {
            self.inner.mark_picked_up(id, driver_id).await
        }

        async fn complete(&self, id: Uuid, driver_id: Uuid) -> Result<Booking, AppError> {
            self.inner.complete(id, driver_id).await
        }

        async fn cancel(&self, id: Uuid) -> Result<Booking, AppError> {
            self.inner.cancel(id).await
        }

        async fn update_rider_location(
            &self,
            id: Uuid,
            location: GeoPoint,
        ) -> Result<Booking, AppError> {
            self.inner.update_rider_location(id, location).await
        }
    }

    #[tokio::test]
    async fn refresh_maps_bookings_into_cards() {
        let store = Arc::new(InMemoryBookingStore::new(16));
        let booking = store.create(new_booking()).await.unwrap();

        let mut manager = BookingManager::new(store, Some(session()));
        let pending = manager.refresh_pending().await;

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].booking_id, booking.id);
        assert_eq!(pending[0].pickup_name, "Divisoria");
        assert!(pending[0].distance_estimate.ends_with(" km"));
    }

    #[tokio::test]
    async fn transient_fetch_failure_keeps_the_previous_list() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryBookingStore::new(16),
            fail_listing: AtomicBool::new(false),
        });
        store.create(new_booking()).await.unwrap();

        let mut manager = BookingManager::new(store.clone(), Some(session()));
        manager.refresh_pending().await;
        assert_eq!(manager.pending().len(), 1);

        store.fail_listing.store(true, Ordering::SeqCst);
        manager.refresh_pending().await;

        assert_eq!(manager.pending().len(), 1);
    }

    #[tokio::test]
    async fn accept_without_session_is_an_auth_error() {
        let store = Arc::new(InMemoryBookingStore::new(16));
        let booking = store.create(new_booking()).await.unwrap();

        let mut manager = BookingManager::new(store, None);
        let result = manager.accept(booking.id, None).await;

        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn successful_accept_refetches_the_pending_list() {
        let store = Arc::new(InMemoryBookingStore::new(16));
        let booking = store.create(new_booking()).await.unwrap();

        let mut manager = BookingManager::new(store, Some(session()));
        manager.refresh_pending().await;
        assert_eq!(manager.pending().len(), 1);

        let accepted = manager.accept(booking.id, None).await.unwrap();

        assert_eq!(accepted.driver_id, manager.driver_id());
        assert!(manager.pending().is_empty());
    }

    #[tokio::test]
    async fn lost_race_leaves_local_state_unchanged() {
        let store = Arc::new(InMemoryBookingStore::new(16));
        let booking = store.create(new_booking()).await.unwrap();

        let mut winner = BookingManager::new(store.clone(), Some(session()));
        let mut loser = BookingManager::new(store, Some(session()));
        loser.refresh_pending().await;

        winner.accept(booking.id, None).await.unwrap();
        let result = loser.accept(booking.id, None).await;

        assert!(matches!(result, Err(AppError::ClaimConflict(_))));
        // The stale card stays until the next refresh; no optimistic edit.
        assert_eq!(loser.pending().len(), 1);
    }
}
