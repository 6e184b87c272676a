//! Storage, report, and capture recorder configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// SQLite file holding the capture log
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Where the inferred schema document is written
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
    /// Rows per page when scanning the whole log
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            report_path: default_report_path(),
            page_size: default_page_size(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/schemashield.sqlite")
}

fn default_report_path() -> PathBuf {
    PathBuf::from("data/openapi.yaml")
}

fn default_page_size() -> usize {
    crate::capture::DEFAULT_PAGE_SIZE
}

/// Background capture submission settings for the proxy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// Base URL of the core API that accepts `POST /capture`
    #[serde(default = "default_ingest_base")]
    pub ingest_base_url: String,
    /// Per-submission timeout
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_ms: u64,
    /// Captures waiting for submission; further captures are dropped
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ingest_base_url: default_ingest_base(),
            submit_timeout_ms: default_submit_timeout(),
            queue_size: default_queue_size(),
        }
    }
}

fn default_ingest_base() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_submit_timeout() -> u64 {
    5000
}

fn default_queue_size() -> usize {
    1024
}
