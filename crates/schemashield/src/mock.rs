//! Mock responder: replays the latest captured response body for a path.
//!
//! Only the single most recent capture for the exact path is consulted and
//! the live upstream is never contacted.

use crate::capture::{CaptureStore, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Diagnostic returned when a path has never been captured
pub const NO_CAPTURE_MESSAGE: &str = "No capture yet";

/// Outcome of a mock lookup
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// No capture exists for the path
    NotFound,
    /// The stored body parsed as JSON
    Json(serde_json::Value),
    /// The stored body is not JSON; served raw in a fallback envelope
    Raw(String),
}

impl MockOutcome {
    /// Interpret a stored response body. An absent body is treated as empty.
    pub fn from_stored_body(body: Option<&str>) -> Self {
        let body = body.unwrap_or_default();
        match serde_json::from_str(body) {
            Ok(value) => MockOutcome::Json(value),
            Err(e) => {
                debug!("Stored body is not JSON, serving raw: {}", e);
                MockOutcome::Raw(body.to_string())
            }
        }
    }

    /// HTTP status for the outcome
    pub fn status(&self) -> u16 {
        match self {
            MockOutcome::NotFound => 404,
            MockOutcome::Json(_) | MockOutcome::Raw(_) => 200,
        }
    }

    /// JSON payload for the outcome
    pub fn into_body(self) -> serde_json::Value {
        match self {
            MockOutcome::NotFound => serde_json::json!({ "message": NO_CAPTURE_MESSAGE }),
            MockOutcome::Json(value) => value,
            MockOutcome::Raw(raw) => serde_json::json!({ "raw": raw }),
        }
    }
}

pub struct MockResponder {
    store: Arc<CaptureStore>,
}

impl MockResponder {
    pub fn new(store: Arc<CaptureStore>) -> Self {
        Self { store }
    }

    /// Look up the latest capture for `path` (which must start with `/`).
    pub async fn lookup(&self, path: &str) -> Result<MockOutcome, StoreError> {
        let latest = self.store.latest_by_path_async(path.to_string()).await?;
        Ok(match latest {
            None => MockOutcome::NotFound,
            Some(capture) => {
                debug!("Mocking {} from capture {}", path, capture.id);
                MockOutcome::from_stored_body(capture.exchange.res_body.as_deref())
            }
        })
    }
}
