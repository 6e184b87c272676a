//! Listener configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl ListenConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve to a socket address. Only literal IPs and `localhost` are accepted.
    pub fn socket_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        let ip: IpAddr = match self.host.as_str() {
            "localhost" => IpAddr::from([127, 0, 0, 1]),
            host => host
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid listen host '{host}': {e}"))?,
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}
