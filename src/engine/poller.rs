use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{info, warn};

use crate::state::AppState;
use crate::store::BookingStore;

/// Fixed-interval pending poll; a failed tick is logged and superseded by
/// the next one.
pub async fn run_pending_poller(state: Arc<AppState>, poll_interval: Duration) {
    info!(interval_secs = poll_interval.as_secs(), "pending poller started");

    let mut ticker = interval(poll_interval);
    loop {
        ticker.tick().await;

        match state.store.list_pending().await {
            Ok(pending) => {
                state.metrics.pending_bookings.set(pending.len() as i64);
            }
            Err(err) => {
                warn!(error = %err, "pending poll failed; retrying next tick");
            }
        }

        state.metrics.active_trips.set(state.trips.len() as i64);
    }
}
