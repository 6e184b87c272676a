//! Reverse proxy forwarder.
//!
//! Requests on `/proxy/{tail}` are relayed to the configured upstream and the
//! upstream's response is returned verbatim. Each completed exchange is
//! turned into a capture and queued for background submission; recording
//! never delays or alters the client's response.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct and accept loop
//! - `handler` - Request routing and capture construction
//! - `forwarding` - Upstream request/response relay
//! - `recorder` - Background capture queue and sinks
//! - `body` - Text decoding of bodies and headers
//! - `client` - Pooled upstream HTTP client

mod body;
mod client;
mod forwarding;
mod handler;
mod recorder;
mod server;

pub use body::{decode_text, header_fields, BodyText};
pub use client::{create_http_client, HttpClient};
pub use forwarding::{build_target, error_response, forward_request, ForwardError, UpstreamResponse};
pub use handler::{build_capture, handle_request, RequestHandlerContext, PROXY_PREFIX};
pub use recorder::{CaptureRecorder, CaptureSink, HttpCaptureSink, RecordError, StoreCaptureSink};
pub use server::ProxyServer;
