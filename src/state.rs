use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::lifecycle::RideLifecycleController;
use crate::models::driver::Driver;
use crate::observability::metrics::Metrics;
use crate::store::InMemoryBookingStore;

pub type DriverTrip = RideLifecycleController<InMemoryBookingStore>;

pub struct AppState {
    pub store: Arc<InMemoryBookingStore>,
    pub drivers: DashMap<Uuid, Driver>,
    /// One live trip session per driver, behind an async mutex so no map
    /// guard is held across an await.
    pub trips: DashMap<Uuid, Arc<Mutex<DriverTrip>>>,
    pub routing_base_url: String,
    pub min_move_m: f64,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize, routing_base_url: String, min_move_m: f64) -> Self {
        Self {
            store: Arc::new(InMemoryBookingStore::new(event_buffer_size)),
            drivers: DashMap::new(),
            trips: DashMap::new(),
            routing_base_url,
            min_move_m,
            metrics: Metrics::new(),
        }
    }
}
