use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub parcels_booked_total: IntCounter,
    pub status_updates_total: IntCounterVec,
    pub location_updates_total: IntCounterVec,
    pub sessions_expired_total: IntCounter,
    pub live_subscribers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let parcels_booked_total =
            IntCounter::new("parcels_booked_total", "Total parcels booked")
                .expect("valid parcels_booked_total metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Status updates by target status"),
            &["status"],
        )
        .expect("valid status_updates_total metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new("location_updates_total", "Location reports by outcome"),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        let sessions_expired_total =
            IntCounter::new("sessions_expired_total", "Sessions cleared by expiry")
                .expect("valid sessions_expired_total metric");

        let live_subscribers = IntGauge::new(
            "live_subscribers",
            "Currently connected live tracking subscribers",
        )
        .expect("valid live_subscribers metric");

        registry
            .register(Box::new(parcels_booked_total.clone()))
            .expect("register parcels_booked_total");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(sessions_expired_total.clone()))
            .expect("register sessions_expired_total");
        registry
            .register(Box::new(live_subscribers.clone()))
            .expect("register live_subscribers");

        Self {
            registry,
            parcels_booked_total,
            status_updates_total,
            location_updates_total,
            sessions_expired_total,
            live_subscribers,
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
