use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub claims_total: IntCounterVec,
    pub pending_bookings: IntGauge,
    pub active_trips: IntGauge,
    pub claim_latency_seconds: HistogramVec,
    pub trip_transitions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Booking claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let pending_bookings = IntGauge::new(
            "pending_bookings",
            "Current number of unclaimed bookings",
        )
        .expect("valid pending_bookings metric");

        let active_trips = IntGauge::new("active_trips", "Current number of driver trip sessions")
            .expect("valid active_trips metric");

        let claim_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "claim_latency_seconds",
                "Latency of claim processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid claim_latency_seconds metric");

        let trip_transitions_total = IntCounterVec::new(
            Opts::new("trip_transitions_total", "Trip transitions by kind"),
            &["transition"],
        )
        .expect("valid trip_transitions_total metric");

        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(pending_bookings.clone()))
            .expect("register pending_bookings");
        registry
            .register(Box::new(active_trips.clone()))
            .expect("register active_trips");
        registry
            .register(Box::new(claim_latency_seconds.clone()))
            .expect("register claim_latency_seconds");
        registry
            .register(Box::new(trip_transitions_total.clone()))
            .expect("register trip_transitions_total");

        Self {
            registry,
            claims_total,
            pending_bookings,
            active_trips,
            claim_latency_seconds,
            trip_transitions_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
