//! Request handling for the forwarding proxy.

use super::body::{decode_text, header_fields};
use super::client::HttpClient;
use super::forwarding::{build_target, error_response, forward_request};
use super::recorder::CaptureRecorder;
use crate::capture::{route_path, NewCapture};
use crate::metrics;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{HeaderMap, Method, Request, Response, Uri};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Route prefix for forwarded traffic
pub const PROXY_PREFIX: &str = "/proxy/";

/// Shared state borrowed by every request
pub struct RequestHandlerContext<'a> {
    pub http_client: &'a HttpClient,
    pub upstream_base: &'a str,
    pub request_timeout: Duration,
    pub recorder: &'a CaptureRecorder,
}

/// Handle one inbound request: forward `/proxy/{tail}`, 404 for anything else.
pub async fn handle_request<B>(
    ctx: &RequestHandlerContext<'_>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let Some(tail) = req.uri().path().strip_prefix(PROXY_PREFIX).map(str::to_string) else {
        debug!("No proxy route for {}", req.uri().path());
        return Ok(error_response(404, "Not Found"));
    };
    let query = req.uri().query().map(str::to_string);

    let (parts, body) = req.into_parts();
    let req_body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to collect request body: {}", e);
            return Ok(error_response(400, "Failed to read request body"));
        }
    };

    let target = match build_target(ctx.upstream_base, &tail, query.as_deref()) {
        Ok(target) => target,
        Err(e) => {
            warn!("{}", e);
            metrics::record_forward_error(parts.method.as_str());
            return Ok(error_response(e.status(), &e.to_string()));
        }
    };

    // Detached: hyper drops this future on client disconnect, the exchange
    // and its capture must still complete.
    let exchange = tokio::spawn(forward_and_record(
        ctx.http_client.clone(),
        ctx.recorder.clone(),
        parts.method,
        parts.headers,
        tail,
        target,
        req_body,
        ctx.request_timeout,
    ));

    match exchange.await {
        Ok(response) => Ok(response),
        Err(e) => {
            error!("Forwarding task failed: {}", e);
            Ok(error_response(502, "Forwarding task failed"))
        }
    }
}

/// Forward one request, queue its capture, and return the client response.
#[allow(clippy::too_many_arguments)]
async fn forward_and_record(
    http_client: HttpClient,
    recorder: CaptureRecorder,
    method: Method,
    headers: HeaderMap,
    tail: String,
    target: Uri,
    req_body: Bytes,
    request_timeout: Duration,
) -> Response<Full<Bytes>> {
    let upstream = match forward_request(
        &http_client,
        method.clone(),
        target,
        &headers,
        req_body.clone(),
        request_timeout,
    )
    .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            error!("Failed to forward {} /{}: {}", method, tail, e);
            metrics::record_forward_error(method.as_str());
            return error_response(e.status(), &e.to_string());
        }
    };

    metrics::record_forward(method.as_str(), upstream.status(), upstream.latency_ms);

    let capture = build_capture(
        &method,
        &tail,
        &headers,
        &req_body,
        upstream.status(),
        &upstream.parts.headers,
        &upstream.body,
        upstream.latency_ms,
    );
    if let Err(e) = recorder.record(capture) {
        warn!("Capture for {} /{} not queued: {}", method, tail, e);
    }

    upstream.into_response()
}

/// Build the capture record for one completed exchange.
#[allow(clippy::too_many_arguments)]
pub fn build_capture(
    method: &Method,
    tail: &str,
    req_headers: &HeaderMap,
    req_body: &[u8],
    status: u16,
    res_headers: &HeaderMap,
    res_body: &[u8],
    latency_ms: u64,
) -> NewCapture {
    NewCapture {
        method: method.as_str().to_ascii_uppercase(),
        path: route_path(tail),
        status,
        req_headers: header_fields(req_headers),
        req_body: decode_text(req_body).into_lossy(),
        res_headers: header_fields(res_headers),
        res_body: decode_text(res_body).into_lossy(),
        latency_ms,
    }
}
