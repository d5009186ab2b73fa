use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{
    Booking, BookingEvent, BookingEventKind, BookingStatus, GeoPoint,
};
use crate::store::{BookingStore, DriverClaim, NewBooking};

/// DashMap-backed booking store. Every mutation runs under the entry's
/// exclusive guard, making `accept` a compare-and-swap on `Pending`.
pub struct InMemoryBookingStore {
    bookings: DashMap<Uuid, Booking>,
    events_tx: broadcast::Sender<BookingEvent>,
}

impl InMemoryBookingStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            bookings: DashMap::new(),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.events_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    fn emit(&self, kind: BookingEventKind, booking: &Booking) {
        let _ = self.events_tx.send(BookingEvent {
            kind,
            booking: booking.clone(),
        });
    }
}

impl BookingStore for InMemoryBookingStore {
    async fn create(&self, req: NewBooking) -> Result<Booking, AppError> {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            rider_id: req.rider_id,
            driver_id: None,
            pickup: req.pickup,
            dropoff: req.dropoff,
            status: BookingStatus::Pending,
            rider_location: None,
            created_at: now,
            accepted_at: None,
            updated_at: now,
        };

        self.bookings.insert(booking.id, booking.clone());
        self.emit(BookingEventKind::Created, &booking);

        Ok(booking)
    }

    async fn get(&self, id: Uuid) -> Result<Booking, AppError> {
        self.bookings
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))
    }

    async fn list_pending(&self) -> Result<Vec<Booking>, AppError> {
        Ok(self
            .bookings
            .iter()
            .filter(|entry| entry.value().status == BookingStatus::Pending)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn history(&self) -> Result<Vec<Booking>, AppError> {
        Ok(self
            .bookings
            .iter()
            .filter(|entry| entry.value().status == BookingStatus::Completed)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn accept(&self, id: Uuid, claim: DriverClaim) -> Result<Booking, AppError> {
        let updated = {
            let mut entry = self
                .bookings
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

            if entry.status != BookingStatus::Pending {
                return Err(AppError::ClaimConflict(format!(
                    "booking {id} is no longer pending"
                )));
            }

            entry.status = BookingStatus::Accepted;
            entry.driver_id = Some(claim.driver_id);
            entry.accepted_at = Some(claim.claimed_at);
            entry.updated_at = Utc::now();
            entry.clone()
        };

        self.emit(BookingEventKind::Accepted, &updated);
        Ok(updated)
    }

    async fn mark_picked_up(&self, id: Uuid, driver_id: Uuid) -> Result<Booking, AppError> {
        let updated = {
            let mut entry = self
                .bookings
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

            if entry.driver_id != Some(driver_id) {
                return Err(AppError::ClaimConflict(format!(
                    "booking {id} is not assigned to driver {driver_id}"
                )));
            }

            if !entry.status.can_transition_to(BookingStatus::PickedUp) {
                return Err(AppError::InvalidTransition {
                    from: entry.status,
                    to: BookingStatus::PickedUp,
                });
            }

            entry.status = BookingStatus::PickedUp;
            entry.updated_at = Utc::now();
            entry.clone()
        };

        self.emit(BookingEventKind::PickedUp, &updated);
        Ok(updated)
    }

    async fn complete(&self, id: Uuid, driver_id: Uuid) -> Result<Booking, AppError> {
        let updated = {
            let mut entry = self
                .bookings
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

            if entry.driver_id != Some(driver_id) {
                return Err(AppError::ClaimConflict(format!(
                    "booking {id} is not assigned to driver {driver_id}"
                )));
            }

            if !entry.status.can_transition_to(BookingStatus::Completed) {
                return Err(AppError::InvalidTransition {
                    from: entry.status,
                    to: BookingStatus::Completed,
                });
            }

            entry.status = BookingStatus::Completed;
            entry.updated_at = Utc::now();
            entry.clone()
        };

        self.emit(BookingEventKind::Completed, &updated);
        Ok(updated)
    }

    async fn cancel(&self, id: Uuid) -> Result<Booking, AppError> {
        let updated = {
            let mut entry = self
                .bookings
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

            if !entry.status.can_transition_to(BookingStatus::Cancelled) {
                return Err(AppError::InvalidTransition {
                    from: entry.status,
                    to: BookingStatus::Cancelled,
                });
            }

            entry.status = BookingStatus::Cancelled;
            entry.driver_id = None;
            entry.accepted_at = None;
            entry.updated_at = Utc::now();
            entry.clone()
        };

        self.emit(BookingEventKind::Cancelled, &updated);
        Ok(updated)
    }

    async fn update_rider_location(
        &self,
        id: Uuid,
        location: GeoPoint,
    ) -> Result<Booking, AppError> {
        let mut entry = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

        entry.rider_location = Some(location);
        entry.updated_at = Utc::now();

        Ok(entry.clone())
    }
}
