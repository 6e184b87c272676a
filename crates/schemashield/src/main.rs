use anyhow::Context;
use clap::{Parser, Subcommand};
use schemashield::capture::CaptureStore;
use schemashield::config::{Config, ConfigOverrides};
use schemashield::core_api::CoreApiServer;
use schemashield::proxy::{CaptureRecorder, CaptureSink, HttpCaptureSink, ProxyServer, StoreCaptureSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Record API traffic through a forwarding proxy, infer an OpenAPI document,
/// and replay captured bodies as mocks.
#[derive(Parser, Debug)]
#[command(name = "schemashield")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional YAML configuration file; flags and environment win over it
    #[arg(short, long, env = "SCHEMASHIELD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Capture database file
    #[arg(long, env = "DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Where GET /report writes the YAML document
    #[arg(long, env = "REPORT_PATH", global = true)]
    report_path: Option<PathBuf>,

    #[arg(long, env = "CORE_HOST", global = true)]
    core_host: Option<String>,

    #[arg(long, env = "CORE_PORT", global = true)]
    core_port: Option<u16>,

    #[arg(long, env = "PROXY_HOST", global = true)]
    proxy_host: Option<String>,

    #[arg(long, env = "PROXY_PORT", global = true)]
    proxy_port: Option<u16>,

    /// Upstream base URL that /proxy/* is forwarded to
    #[arg(long, env = "PROXY_TARGET_BASE", global = true)]
    target_base: Option<String>,

    /// Core API base URL the proxy submits captures to
    #[arg(long, env = "CORE_API", global = true)]
    core_api: Option<String>,

    /// Capture submission timeout in milliseconds
    #[arg(long, env = "CAPTURE_TIMEOUT_MS", global = true)]
    capture_timeout_ms: Option<u64>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the core API (ingest, report, mock)
    Core,
    /// Run the forwarding proxy, submitting captures to the core API over HTTP
    Proxy,
    /// Run both services in one process sharing the capture store
    All,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_path: self.db_path.clone(),
            report_path: self.report_path.clone(),
            core_host: self.core_host.clone(),
            core_port: self.core_port,
            proxy_host: self.proxy_host.clone(),
            proxy_port: self.proxy_port,
            target_base: self.target_base.clone(),
            ingest_base: self.core_api.clone(),
            submit_timeout_ms: self.capture_timeout_ms,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "schemashield=debug"
    } else {
        "schemashield=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_store(config: &Config) -> Result<Arc<CaptureStore>, anyhow::Error> {
    let store = CaptureStore::open(&config.storage.db_path)
        .with_context(|| format!("opening {}", config.storage.db_path.display()))?
        .with_page_size(config.storage.page_size);
    Ok(Arc::new(store))
}

async fn run_core(config: &Config) -> Result<(), anyhow::Error> {
    let store = open_store(config)?;
    CoreApiServer::new(config, store)?.run().await
}

async fn run_proxy(config: &Config) -> Result<(), anyhow::Error> {
    let sink = HttpCaptureSink::new(
        &config.recorder.ingest_base_url,
        Duration::from_millis(config.recorder.submit_timeout_ms),
    )?;
    info!("Submitting captures to {}", sink.endpoint());
    let sink: Arc<dyn CaptureSink> = Arc::new(sink);
    let recorder = CaptureRecorder::spawn(sink, &config.recorder);
    ProxyServer::new(config, recorder)?.run().await
}

async fn run_all(config: &Config) -> Result<(), anyhow::Error> {
    let store = open_store(config)?;
    let sink: Arc<dyn CaptureSink> = Arc::new(StoreCaptureSink::new(Arc::clone(&store)));
    let recorder = CaptureRecorder::spawn(sink, &config.recorder);

    let core = CoreApiServer::new(config, store)?;
    let proxy = ProxyServer::new(config, recorder)?;

    tokio::try_join!(core.run(), proxy.run())?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::load(args.config.as_deref(), &args.overrides())
        .context("invalid configuration")?;

    let service = async {
        match args.command {
            Command::Core => run_core(&config).await,
            Command::Proxy => run_proxy(&config).await,
            Command::All => run_all(&config).await,
        }
    };

    tokio::select! {
        result = service => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}
