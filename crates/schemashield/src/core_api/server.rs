//! Core API server.

use super::router::route_request;
use crate::capture::CaptureStore;
use crate::config::Config;
use crate::mock::MockResponder;
use crate::report::ReportGenerator;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Shared handles used by every core API request.
pub struct CoreState {
    pub store: Arc<CaptureStore>,
    pub reports: Arc<ReportGenerator>,
    pub mock: MockResponder,
}

impl CoreState {
    pub fn new(store: Arc<CaptureStore>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            reports: Arc::new(ReportGenerator::new(Arc::clone(&store), report_path)),
            mock: MockResponder::new(Arc::clone(&store)),
            store,
        }
    }
}

/// Core API server
pub struct CoreApiServer {
    addr: SocketAddr,
    state: Arc<CoreState>,
}

impl CoreApiServer {
    /// Create a core API server over an opened store.
    pub fn new(config: &Config, store: Arc<CaptureStore>) -> Result<Self, anyhow::Error> {
        Ok(Self {
            addr: config.core.socket_addr()?,
            state: Arc::new(CoreState::new(store, &config.storage.report_path)),
        })
    }

    pub fn state(&self) -> &Arc<CoreState> {
        &self.state
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!("Core API listening on http://{}", listener.local_addr()?);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { route_request(req, &state).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(
                        "Error serving core API connection from {}: {}",
                        remote_addr, err
                    );
                }
            });
        }
    }
}
