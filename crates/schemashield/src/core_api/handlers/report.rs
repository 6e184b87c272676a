//! Schema report handler.

use crate::core_api::types::*;
use crate::report::ReportGenerator;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::error;

/// GET /report - Recompute, persist, and return the inferred schema
pub async fn handle_report(generator: &Arc<ReportGenerator>) -> Response<Full<Bytes>> {
    match generator.generate_report_async().await {
        Ok(doc) => json_response(
            StatusCode::OK,
            &ReportResponse {
                summary: ReportSummary {
                    endpoints: doc.endpoint_count(),
                },
                openapi: doc,
            },
        ),
        Err(e) => {
            error!("Failed to generate report: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
