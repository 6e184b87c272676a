//! Mock replay handler.

use crate::core_api::types::*;
use crate::metrics;
use crate::mock::{MockOutcome, MockResponder};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::error;

/// GET /mock/{path} - Replay the latest captured body for `path`
pub async fn handle_mock(path: &str, responder: &MockResponder) -> Response<Full<Bytes>> {
    match responder.lookup(path).await {
        Ok(outcome) => {
            metrics::record_mock_lookup(match &outcome {
                MockOutcome::NotFound => "not_found",
                MockOutcome::Json(_) => "json",
                MockOutcome::Raw(_) => "raw",
            });
            let status =
                StatusCode::from_u16(outcome.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            json_response(status, &outcome.into_body())
        }
        Err(e) => {
            metrics::record_mock_lookup("error");
            error!("Mock lookup for {} failed: {}", path, e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
    }
}
