//! Capture ingest handler.

use crate::capture::{CaptureStore, NewCapture, StoreError};
use crate::core_api::types::*;
use crate::metrics;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, error};

/// POST /capture - Append one captured exchange
pub async fn handle_ingest<B>(req: Request<B>, store: &Arc<CaptureStore>) -> Response<Full<Bytes>>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let capture: NewCapture = match serde_json::from_slice(&body) {
        Ok(c) => c,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid capture JSON: {e}"),
            )
        }
    };

    let capture = match capture.normalize() {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match store.append_async(capture).await {
        Ok(id) => {
            metrics::record_capture_stored();
            debug!("Ingested capture {}", id);
            json_response(StatusCode::OK, &IngestResponse { id })
        }
        Err(e @ StoreError::Invalid(_)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e @ StoreError::StorageUnavailable(_)) => {
            error!("Capture store unavailable: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
        Err(e) => {
            error!("Failed to store capture: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
