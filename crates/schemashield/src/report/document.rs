//! Inferred schema document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const OPENAPI_VERSION: &str = "3.0.3";
const INFO_TITLE: &str = "Inferred API";
const INFO_VERSION: &str = "0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Status code (as a string key) → description
    pub responses: IndexMap<String, ResponseEntry>,
}

/// Lowercase method → operation
pub type PathItem = IndexMap<String, Operation>;

/// Projection of the capture log: every observed (path, method, status).
///
/// Maps keep first-seen order at every level so the same history always
/// produces the same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub openapi: String,
    pub info: Info,
    pub paths: IndexMap<String, PathItem>,
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: INFO_TITLE.to_string(),
                version: INFO_VERSION.to_string(),
            },
            paths: IndexMap::new(),
        }
    }
}

impl SchemaDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation, inserting each level only if absent.
    pub fn observe(&mut self, path: &str, method: &str, status: u16) {
        let operation = self
            .paths
            .entry(path.to_string())
            .or_default()
            .entry(method.to_ascii_lowercase())
            .or_default();
        operation
            .responses
            .entry(status.to_string())
            .or_insert_with(|| ResponseEntry {
                description: format!("Observed {status}"),
            });
    }

    /// Number of distinct paths
    pub fn endpoint_count(&self) -> usize {
        self.paths.len()
    }

    /// Whether `(path, method, status)` has been observed
    pub fn contains(&self, path: &str, method: &str, status: u16) -> bool {
        self.paths
            .get(path)
            .and_then(|item| item.get(&method.to_ascii_lowercase()))
            .is_some_and(|op| op.responses.contains_key(&status.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
