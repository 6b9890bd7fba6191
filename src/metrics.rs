use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of generation requests")
            .expect("register gateway_requests_total");
    pub static ref RATE_LIMITED: Counter =
        register_counter!("gateway_rate_limited_total", "Requests rejected by the rate limiter")
            .expect("register gateway_rate_limited_total");
    pub static ref UPSTREAM_FAILURES: CounterVec = register_counter_vec!(
        "gateway_upstream_failures_total",
        "Failed upstream completions by kind",
        &["kind"]
    )
    .expect("register gateway_upstream_failures_total");
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "gateway_upstream_latency_seconds",
        "Upstream completion latency in seconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0]
    )
    .expect("register gateway_upstream_latency_seconds");
    pub static ref TRACKED_IDENTITIES: Gauge =
        register_gauge!("gateway_tracked_identities", "Identities held by the rate limiter")
            .expect("register gateway_tracked_identities");
    pub static ref OPERATOR_ALERTS: Counter =
        register_counter!("gateway_operator_alerts_total", "Alerts raised for exhausted upstream credits")
            .expect("register gateway_operator_alerts_total");
}
