//! System handlers: health and metrics.

use crate::core_api::types::*;
use crate::metrics::collect_metrics;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::error;

/// GET /health - Liveness probe
pub fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({"ok": true}))
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    match collect_metrics() {
        Ok(text) => build_response_with_headers(
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}
