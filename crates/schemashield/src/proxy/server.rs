//! ProxyServer struct and main run loop.

use super::client::{create_http_client, HttpClient};
use super::handler::{handle_request, RequestHandlerContext};
use super::recorder::CaptureRecorder;
use crate::config::Config;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// The forwarding proxy: relays `/proxy/{tail}` to the upstream and records
/// each exchange in the background.
pub struct ProxyServer {
    addr: SocketAddr,
    upstream_base: String,
    request_timeout: Duration,
    http_client: HttpClient,
    recorder: CaptureRecorder,
}

impl ProxyServer {
    /// Create a new ProxyServer from configuration.
    pub fn new(config: &Config, recorder: CaptureRecorder) -> Result<Self, anyhow::Error> {
        Ok(Self {
            addr: config.proxy.socket_addr()?,
            upstream_base: config.upstream.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.upstream.request_timeout_secs),
            http_client: create_http_client(&config.connection_pool)?,
            recorder,
        })
    }

    pub fn upstream_base(&self) -> &str {
        &self.upstream_base
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!("Proxy listening on http://{}", listener.local_addr()?);
        info!("Proxying /proxy/* to {}", self.upstream_base);

        let server = Arc::new(self);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { server.handle_request_internal(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(
                        "Error serving proxy connection from {}: {}",
                        remote_addr, err
                    );
                }
            });
        }
    }

    async fn handle_request_internal(
        &self,
        req: hyper::Request<hyper::body::Incoming>,
    ) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
        let ctx = RequestHandlerContext {
            http_client: &self.http_client,
            upstream_base: &self.upstream_base,
            request_timeout: self.request_timeout,
            recorder: &self.recorder,
        };

        handle_request(&ctx, req).await
    }
}
