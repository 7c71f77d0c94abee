use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub idempotency_requests_total: IntCounterVec,
    pub location_pushes_total: IntCounter,
    pub live_subscribers: IntGauge,
    pub cached_locations: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders created")
                .expect("valid orders_created_total metric");

        let idempotency_requests_total = IntCounterVec::new(
            Opts::new(
                "idempotency_requests_total",
                "Idempotency-guarded requests by outcome",
            ),
            &["outcome"],
        )
        .expect("valid idempotency_requests_total metric");

        let location_pushes_total =
            IntCounter::new("location_pushes_total", "Total accepted courier location pushes")
                .expect("valid location_pushes_total metric");

        let live_subscribers =
            IntGauge::new("live_subscribers", "Current live-feed subscriber connections")
                .expect("valid live_subscribers metric");

        let cached_locations =
            IntGauge::new("cached_locations", "Courier locations currently cached")
                .expect("valid cached_locations metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(idempotency_requests_total.clone()))
            .expect("register idempotency_requests_total");
        registry
            .register(Box::new(location_pushes_total.clone()))
            .expect("register location_pushes_total");
        registry
            .register(Box::new(live_subscribers.clone()))
            .expect("register live_subscribers");
        registry
            .register(Box::new(cached_locations.clone()))
            .expect("register cached_locations");

        Self {
            registry,
            orders_created_total,
            idempotency_requests_total,
            location_pushes_total,
            live_subscribers,
            cached_locations,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
