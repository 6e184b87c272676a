//! Prometheus metrics for schemashield.
//!
//! Tracks forwarding outcomes, upstream latency, and the capture pipeline.
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Requests forwarded to the upstream, by outcome
    pub static ref FORWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "schemashield_forwarded_total",
        "Total number of requests forwarded by the proxy",
        &["method", "status"]  // status: upstream status code, or "error"
    )
    .expect("register schemashield_forwarded_total");

    /// Upstream round trip duration
    pub static ref UPSTREAM_LATENCY_MS: HistogramVec = register_histogram_vec!(
        "schemashield_upstream_latency_ms",
        "Duration of upstream round trips in milliseconds",
        &["method"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .expect("register schemashield_upstream_latency_ms");

    /// Capture submissions from the proxy recorder, by result
    pub static ref CAPTURE_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "schemashield_capture_submissions_total",
        "Capture submissions attempted by the proxy recorder",
        &["result"]  // result: ok|failed|timeout|queue_full|closed
    )
    .expect("register schemashield_capture_submissions_total");

    /// Captures durably written by the core API
    pub static ref CAPTURES_STORED_TOTAL: IntCounter = register_int_counter!(
        "schemashield_captures_stored_total",
        "Total number of captures written to the capture store"
    )
    .expect("register schemashield_captures_stored_total");

    /// Mock lookups, by outcome
    pub static ref MOCK_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "schemashield_mock_lookups_total",
        "Mock responder lookups",
        &["outcome"]  // outcome: json|raw|not_found|error
    )
    .expect("register schemashield_mock_lookups_total");
}

/// Collect all metrics in Prometheus text format
pub fn collect_metrics() -> Result<String, anyhow::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_forward(method: &str, status: u16, latency_ms: u64) {
    FORWARDED_TOTAL
        .with_label_values(&[method, &status.to_string()])
        .inc();
    UPSTREAM_LATENCY_MS
        .with_label_values(&[method])
        .observe(latency_ms as f64);
}

pub fn record_forward_error(method: &str) {
    FORWARDED_TOTAL.with_label_values(&[method, "error"]).inc();
}

pub fn record_capture_submission(result: &str) {
    CAPTURE_SUBMISSIONS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_capture_stored() {
    CAPTURES_STORED_TOTAL.inc();
}

pub fn record_mock_lookup(outcome: &str) {
    MOCK_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
}
