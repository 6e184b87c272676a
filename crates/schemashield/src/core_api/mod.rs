//! Core API: capture ingest, schema report, and mock replay.
//!
//! Endpoints:
//! - `GET /health` - liveness probe
//! - `POST /capture` - ingest one captured exchange
//! - `GET /report` - recompute and persist the inferred schema
//! - `GET /mock/{path}` - replay the latest captured body for a path
//! - `GET /metrics` - Prometheus metrics

mod handlers;
mod router;
mod server;
mod types;

pub use router::route_request;
pub use server::{CoreApiServer, CoreState};
pub use types::{IngestResponse, ReportResponse, ReportSummary};
