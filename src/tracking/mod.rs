use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::AppError;
use crate::geo::haversine_m;
use crate::models::booking::GeoPoint;

/// Outcome of the platform location prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

struct Subscription {
    tx: watch::Sender<Option<GeoPoint>>,
    last_published: Option<GeoPoint>,
}

/// Coalesced position feed for one driver session; only the latest fix is
/// retained.
pub struct LocationTracker {
    min_move_m: f64,
    subscription: Option<Subscription>,
}

impl LocationTracker {
    pub fn new(min_move_m: f64) -> Self {
        Self {
            min_move_m,
            subscription: None,
        }
    }

    /// Opens the subscription. A denied permission never subscribes.
    pub fn start(
        &mut self,
        permission: PermissionState,
    ) -> Result<watch::Receiver<Option<GeoPoint>>, AppError> {
        if permission == PermissionState::Denied {
            return Err(AppError::PermissionDenied);
        }

        let (tx, rx) = watch::channel(None);
        self.subscription = Some(Subscription {
            tx,
            last_published: None,
        });

        Ok(rx)
    }

    /// Feeds a raw sample. Returns true when the fix was published, i.e.
    /// the device moved at least `min_move_m` since the last one.
    pub fn push(&mut self, point: GeoPoint) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };

        if let Some(last) = subscription.last_published {
            if haversine_m(&last, &point) < self.min_move_m {
                return false;
            }
        }

        subscription.last_published = Some(point);
        let _ = subscription.tx.send(Some(point));
        debug!(lat = point.lat, lng = point.lng, "location published");

        true
    }

    pub fn current(&self) -> Option<GeoPoint> {
        self.subscription
            .as_ref()
            .and_then(|subscription| subscription.last_published)
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Releases the subscription; dropping the sender closes every receiver.
    pub fn stop(&mut self) {
        self.subscription = None;
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::{LocationTracker, PermissionState};
    use crate::error::AppError;
    use crate::models::booking::GeoPoint;

    #[test]
    fn denied_permission_never_subscribes() {
        let mut tracker = LocationTracker::new(25.0);

        let result = tracker.start(PermissionState::Denied);

        assert!(matches!(result, Err(AppError::PermissionDenied)));
        assert!(!tracker.is_active());
        assert!(!tracker.push(GeoPoint { lat: 8.48, lng: 124.63 }));
        assert!(tracker.current().is_none());
    }

    #[test]
    fn first_fix_is_always_published() {
        let mut tracker = LocationTracker::new(25.0);
        let rx = tracker.start(PermissionState::Granted).unwrap();

        assert!(tracker.push(GeoPoint { lat: 8.48, lng: 124.63 }));
        assert!(rx.borrow().is_some());
    }

    #[test]
    fn small_moves_are_coalesced() {
        let mut tracker = LocationTracker::new(25.0);
        let _rx = tracker.start(PermissionState::Granted).unwrap();

        assert!(tracker.push(GeoPoint { lat: 8.48, lng: 124.63 }));
        // ~1 meter of latitude.
        assert!(!tracker.push(GeoPoint { lat: 8.48001, lng: 124.63 }));
        // ~1 km of latitude.
        assert!(tracker.push(GeoPoint { lat: 8.49, lng: 124.63 }));
    }

    #[test]
    fn stop_closes_the_receiver() {
        let mut tracker = LocationTracker::new(25.0);
        let rx = tracker.start(PermissionState::Granted).unwrap();

        tracker.stop();

        assert!(!tracker.is_active());
        assert!(rx.has_changed().is_err());
    }
}
