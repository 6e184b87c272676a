//! Configuration types for SchemaShield.
//!
//! Values come from an optional YAML file, then environment variables and
//! command-line flags override individual fields (see [`ConfigOverrides`]).

mod capture;
mod listen;
mod upstream;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use capture::{RecorderConfig, StorageConfig};
pub use listen::ListenConfig;
pub use upstream::{validate_base_url, ConnectionPoolConfig, UpstreamConfig};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Core API listener (health, ingest, report, mock)
    #[serde(default = "default_core_listen")]
    pub core: ListenConfig,
    /// Forwarding proxy listener
    #[serde(default = "default_proxy_listen")]
    pub proxy: ListenConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
}

fn default_core_listen() -> ListenConfig {
    ListenConfig::new("0.0.0.0", 8080)
}

fn default_proxy_listen() -> ListenConfig {
    ListenConfig::new("0.0.0.0", 8081)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: default_core_listen(),
            proxy: default_proxy_listen(),
            upstream: UpstreamConfig::default(),
            storage: StorageConfig::default(),
            recorder: RecorderConfig::default(),
            connection_pool: ConnectionPoolConfig::default(),
        }
    }
}

/// Individual settings taken from the environment or the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub core_host: Option<String>,
    pub core_port: Option<u16>,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
    pub target_base: Option<String>,
    pub ingest_base: Option<String>,
    pub submit_timeout_ms: Option<u64>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise start from defaults, then apply overrides.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, anyhow::Error> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            None => Config::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref db_path) = overrides.db_path {
            self.storage.db_path = db_path.clone();
        }
        if let Some(ref report_path) = overrides.report_path {
            self.storage.report_path = report_path.clone();
        }
        if let Some(ref host) = overrides.core_host {
            self.core.host = host.clone();
        }
        if let Some(port) = overrides.core_port {
            self.core.port = port;
        }
        if let Some(ref host) = overrides.proxy_host {
            self.proxy.host = host.clone();
        }
        if let Some(port) = overrides.proxy_port {
            self.proxy.port = port;
        }
        if let Some(ref base) = overrides.target_base {
            self.upstream.base_url = base.clone();
        }
        if let Some(ref base) = overrides.ingest_base {
            self.recorder.ingest_base_url = base.clone();
        }
        if let Some(timeout) = overrides.submit_timeout_ms {
            self.recorder.submit_timeout_ms = timeout;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_base_url("upstream.base_url", &self.upstream.base_url)
            .map_err(|e| anyhow::anyhow!(e))?;
        validate_base_url("recorder.ingest_base_url", &self.recorder.ingest_base_url)
            .map_err(|e| anyhow::anyhow!(e))?;

        self.core.socket_addr()?;
        self.proxy.socket_addr()?;

        if self.recorder.queue_size == 0 {
            anyhow::bail!("recorder.queue_size must be greater than 0");
        }
        if self.recorder.submit_timeout_ms == 0 {
            anyhow::bail!("recorder.submit_timeout_ms must be greater than 0");
        }
        if self.upstream.request_timeout_secs == 0 {
            anyhow::bail!("upstream.request_timeout_secs must be greater than 0");
        }
        if self.storage.page_size == 0 {
            anyhow::bail!("storage.page_size must be greater than 0");
        }
        if self.storage.db_path.as_os_str().is_empty() {
            anyhow::bail!("storage.db_path must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.core.port, 8080);
        assert_eq!(config.proxy.port, 8081);
        assert_eq!(config.recorder.submit_timeout_ms, 5000);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
core:
  host: 127.0.0.1
  port: 9080
proxy:
  port: 9081
upstream:
  base_url: http://sample-api:8082
storage:
  db_path: /tmp/shield/captures.sqlite
recorder:
  ingest_base_url: http://core-api:8080
  queue_size: 16
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.core.port, 9080);
        assert_eq!(config.proxy.host, "0.0.0.0");
        assert_eq!(config.upstream.base_url, "http://sample-api:8082");
        assert_eq!(config.upstream.request_timeout_secs, 30);
        assert_eq!(config.recorder.queue_size, 16);
        assert_eq!(config.recorder.submit_timeout_ms, 5000);
        assert_eq!(config.storage.report_path, PathBuf::from("data/openapi.yaml"));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config.apply(&ConfigOverrides {
            proxy_port: Some(7000),
            target_base: Some("http://origin:9000".to_string()),
            db_path: Some(PathBuf::from("/var/lib/shield.db")),
            ..Default::default()
        });
        assert_eq!(config.proxy.port, 7000);
        assert_eq!(config.upstream.base_url, "http://origin:9000");
        assert_eq!(config.storage.db_path, PathBuf::from("/var/lib/shield.db"));
        assert_eq!(config.core.port, 8080);
    }

    #[test]
    fn test_invalid_target_rejected() {
        let mut config = Config::default();
        config.upstream.base_url = "sample-api:8082".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_queue_rejected() {
        let mut config = Config::default();
        config.recorder.queue_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_size"));
    }

    #[test]
    fn test_load_from_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shield.yaml");
        std::fs::write(&path, "proxy:\n  port: 6000\n").unwrap();

        let config = Config::load(
            Some(&path),
            &ConfigOverrides {
                core_port: Some(6001),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.proxy.port, 6000);
        assert_eq!(config.core.port, 6001);

        let from_file = Config::from_file(&path).unwrap();
        assert_eq!(from_file.core.port, 8080);
    }
}
