//! Types for captured exchanges.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered header name to value mapping, stored as a JSON object.
pub type HeaderFields = IndexMap<String, serde_json::Value>;

/// A captured exchange as submitted to the ingest endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCapture {
    pub method: String,
    pub path: String,
    pub status: u16,
    #[serde(default)]
    pub req_headers: HeaderFields,
    #[serde(default)]
    pub req_body: Option<String>,
    #[serde(default)]
    pub res_headers: HeaderFields,
    #[serde(default)]
    pub res_body: Option<String>,
    pub latency_ms: u64,
}

/// A stored capture. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    /// Store-assigned, strictly increasing in insertion order
    pub id: i64,
    /// Unix timestamp in milliseconds, assigned on insert
    pub created_at: i64,
    #[serde(flatten)]
    pub exchange: NewCapture,
}

/// Reasons an ingest payload is rejected before it reaches storage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCapture {
    #[error("method must not be empty")]
    EmptyMethod,
    #[error("method {0:?} is not a valid HTTP token")]
    InvalidMethod(String),
    #[error("path {0:?} must start with '/'")]
    RelativePath(String),
    #[error("status {0} is outside 100..=999")]
    InvalidStatus(u16),
    #[error("latency_ms {0} exceeds the signed 64-bit range")]
    LatencyOutOfRange(u64),
}

impl NewCapture {
    /// Validate the payload and normalize the method to uppercase.
    pub fn normalize(mut self) -> Result<Self, InvalidCapture> {
        let method = self.method.trim();
        if method.is_empty() {
            return Err(InvalidCapture::EmptyMethod);
        }
        if !method.bytes().all(|b| b.is_ascii_alphanumeric() || b"-_.!#$%&'*+^`|~".contains(&b))
        {
            return Err(InvalidCapture::InvalidMethod(self.method));
        }
        self.method = method.to_ascii_uppercase();

        if !self.path.starts_with('/') {
            return Err(InvalidCapture::RelativePath(self.path));
        }
        if !(100..=999).contains(&self.status) {
            return Err(InvalidCapture::InvalidStatus(self.status));
        }
        if i64::try_from(self.latency_ms).is_err() {
            return Err(InvalidCapture::LatencyOutOfRange(self.latency_ms));
        }
        Ok(self)
    }
}

/// Capture path for a route suffix: `/` plus the percent-decoded suffix.
///
/// Used for both the forwarded tail and the mock lookup, so the two always
/// agree. Suffixes that do not decode to UTF-8 are kept as-is.
pub fn route_path(suffix: &str) -> String {
    let decoded = urlencoding::decode(suffix)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| suffix.to_string());
    format!("/{decoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("pets"), "/pets");
        assert_eq!(route_path("pets/1"), "/pets/1");
        assert_eq!(route_path(""), "/");
        assert_eq!(route_path("a%20b"), "/a b");
        assert_eq!(route_path("a%2Fb"), "/a/b");
        assert_eq!(route_path("x%FF"), "/x%FF");
    }

    fn sample() -> NewCapture {
        NewCapture {
            method: "get".to_string(),
            path: "/pets".to_string(),
            status: 200,
            req_headers: HeaderFields::new(),
            req_body: None,
            res_headers: HeaderFields::new(),
            res_body: Some(r#"{"pets":[]}"#.to_string()),
            latency_ms: 5,
        }
    }

    #[test]
    fn test_normalize_uppercases_method() {
        let capture = sample().normalize().unwrap();
        assert_eq!(capture.method, "GET");
    }

    #[test]
    fn test_normalize_rejects_relative_path() {
        let mut capture = sample();
        capture.path = "pets".to_string();
        assert_eq!(
            capture.normalize(),
            Err(InvalidCapture::RelativePath("pets".to_string()))
        );
    }

    #[test]
    fn test_normalize_rejects_bad_method() {
        let mut capture = sample();
        capture.method = "  ".to_string();
        assert_eq!(capture.normalize(), Err(InvalidCapture::EmptyMethod));

        let mut capture = sample();
        capture.method = "GE T".to_string();
        assert!(matches!(
            capture.normalize(),
            Err(InvalidCapture::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_bad_status() {
        let mut capture = sample();
        capture.status = 42;
        assert_eq!(capture.normalize(), Err(InvalidCapture::InvalidStatus(42)));
    }

    #[test]
    fn test_normalize_rejects_unstorable_latency() {
        let mut capture = sample();
        capture.latency_ms = i64::MAX as u64 + 1;
        assert_eq!(
            capture.normalize(),
            Err(InvalidCapture::LatencyOutOfRange(i64::MAX as u64 + 1))
        );

        let mut capture = sample();
        capture.latency_ms = i64::MAX as u64;
        assert!(capture.normalize().is_ok());
    }

    #[test]
    fn test_ingest_payload_defaults() {
        let json = r#"{"method":"GET","path":"/a","status":204,"latency_ms":1}"#;
        let capture: NewCapture = serde_json::from_str(json).unwrap();
        assert!(capture.req_headers.is_empty());
        assert!(capture.res_body.is_none());
    }

    #[test]
    fn test_header_order_preserved() {
        let json = r#"{"method":"GET","path":"/a","status":200,
            "req_headers":{"z-last":"1","a-first":"2"},"res_headers":{},"latency_ms":0}"#;
        let capture: NewCapture = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = capture.req_headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["z-last", "a-first"]);
    }

    #[test]
    fn test_capture_serializes_flat() {
        let capture = Capture {
            id: 7,
            created_at: 1_700_000_000_000,
            exchange: sample(),
        };
        let value = serde_json::to_value(&capture).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["path"], "/pets");
        assert!(value["req_body"].is_null());
    }
}
