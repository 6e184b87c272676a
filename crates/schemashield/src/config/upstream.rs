//! Upstream target and connection pool configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL requests under `/proxy/` are forwarded to
    #[serde(default = "default_target_base")]
    pub base_url: String,
    /// Whole-request timeout for the upstream round trip
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_target_base(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_target_base() -> String {
    "http://127.0.0.1:8082".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_pool_max_idle_per_host")]
    pub max_idle_per_host: usize,

    #[serde(default = "default_pool_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_keepalive_timeout")]
    pub keepalive_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_pool_max_idle_per_host(),
            idle_timeout_secs: default_pool_idle_timeout(),
            keepalive_timeout_secs: default_keepalive_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_keepalive_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    5
}

/// Check that `url` has an http(s) scheme and a host.
pub fn validate_base_url(field: &str, url: &str) -> Result<(), String> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(format!("Invalid URL for {field} (missing scheme): {url}"));
    };
    if !matches!(scheme, "http" | "https") {
        return Err(format!(
            "Unsupported scheme '{scheme}' for {field}. Currently supported: http, https"
        ));
    }
    if rest.is_empty() || rest.starts_with('/') {
        return Err(format!("Invalid URL for {field} (missing host): {url}"));
    }
    Ok(())
}
