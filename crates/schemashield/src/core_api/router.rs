//! Request routing for the core API.

use super::handlers::{captures, mock, report, system};
use super::server::CoreState;
use super::types::not_found;
use crate::capture::route_path;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use tracing::debug;

const MOCK_PREFIX: &str = "/mock/";

/// Route a request to the matching handler.
pub async fn route_request<B>(
    req: Request<B>,
    state: &CoreState,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Core API request: {} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") => system::handle_health(),
        (&Method::GET, "/metrics") => system::handle_metrics(),
        (&Method::POST, "/capture") => captures::handle_ingest(req, &state.store).await,
        (&Method::GET, "/report") => report::handle_report(&state.reports).await,
        (&Method::GET, p) if p.starts_with(MOCK_PREFIX) => {
            let target = route_path(&p[MOCK_PREFIX.len()..]);
            mock::handle_mock(&target, &state.mock).await
        }
        _ => not_found(),
    };

    Ok(response)
}
