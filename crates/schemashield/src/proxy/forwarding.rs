//! Request forwarding to the upstream.
//!
//! The request is relayed with its method, headers and body untouched and the
//! upstream response is handed back in full so it can be both returned to the
//! client and captured.

use super::client::HttpClient;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::http::response::Parts;
use hyper::{HeaderMap, Method, Request, Response, Uri};
use std::time::{Duration, Instant};
use tracing::debug;

/// Errors on the primary forwarding path. All of these reach the client.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),
    #[error("failed to read upstream response body: {0}")]
    UpstreamBody(String),
}

impl ForwardError {
    /// Status surfaced to the proxy's client
    pub fn status(&self) -> u16 {
        match self {
            ForwardError::InvalidTarget { .. } => 400,
            ForwardError::UpstreamTimeout(_) => 504,
            ForwardError::UpstreamUnreachable(_) | ForwardError::UpstreamBody(_) => 502,
        }
    }
}

/// Fully buffered upstream response plus the measured round trip.
pub struct UpstreamResponse {
    pub parts: Parts,
    pub body: Bytes,
    pub latency_ms: u64,
}

impl UpstreamResponse {
    pub fn status(&self) -> u16 {
        self.parts.status.as_u16()
    }

    /// Rebuild the response exactly as the upstream sent it.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        Response::from_parts(self.parts, Full::new(self.body))
    }
}

/// Join the upstream base and the path tail: `<base>/<tail>[?query]`.
pub fn build_target(base: &str, tail: &str, query: Option<&str>) -> Result<Uri, ForwardError> {
    let mut target = format!("{}/{}", base.trim_end_matches('/'), tail);
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    target
        .parse::<Uri>()
        .map_err(|e| ForwardError::InvalidTarget {
            reason: e.to_string(),
            target,
        })
}

/// Helper function to create a JSON error response.
pub fn error_response(status: u16, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Bad Gateway"))))
}

/// Forward a request with a pre-collected body and buffer the full response.
pub async fn forward_request(
    http_client: &HttpClient,
    method: Method,
    target: Uri,
    headers: &HeaderMap,
    body: Bytes,
    timeout: Duration,
) -> Result<UpstreamResponse, ForwardError> {
    debug!("Forwarding {} to: {}", method, target);

    let mut upstream_req = Request::builder().method(method).uri(target);
    if let Some(upstream_headers) = upstream_req.headers_mut() {
        upstream_headers.extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    let upstream_req = upstream_req
        .body(Full::new(body))
        .map_err(|e| ForwardError::UpstreamUnreachable(e.to_string()))?;

    let start = Instant::now();
    let round_trip = async {
        let upstream_response = http_client
            .request(upstream_req)
            .await
            .map_err(|e| ForwardError::UpstreamUnreachable(e.to_string()))?;
        let (parts, body) = upstream_response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| ForwardError::UpstreamBody(e.to_string()))?
            .to_bytes();
        Ok::<_, ForwardError>((parts, body))
    };

    let (parts, body) = tokio::time::timeout(timeout, round_trip)
        .await
        .map_err(|_| ForwardError::UpstreamTimeout(timeout))??;
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(UpstreamResponse {
        parts,
        body,
        latency_ms,
    })
}
