//! rr-proxy: round-robin reverse proxy.
//!
//! Loads configuration, initialises logging and metrics, builds the server
//! pool and serves until SIGINT/SIGTERM. An invalid backend address stops the
//! process at startup.

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rr_proxy::config::loader::{apply_env_overrides, read_config};
use rr_proxy::config::validation::validate_config;
use rr_proxy::config::watcher::ConfigWatcher;
use rr_proxy::config::BalancerConfig;
use rr_proxy::lifecycle::signals::spawn_signal_handler;
use rr_proxy::observability::{logging, metrics};
use rr_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "rr-proxy")]
#[command(about = "Round-robin reverse proxy with passive failure detection", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend address; repeat to list several. Replaces `backends` from the file.
    #[arg(short, long = "backend")]
    backends: Vec<String>,

    /// Listen address, overrides `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Reload the config file when it changes.
    #[arg(long, default_value_t = false)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => {
            let mut config = BalancerConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            config
        }
    };
    if !cli.backends.is_empty() {
        config.backends = cli.backends.clone();
    }
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }

    logging::init_logging(&config.observability);
    tracing::info!("rr-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            tracing::error!(error = %e, "Invalid configuration");
        }
        return Err(format!("invalid configuration ({} errors)", errors.len()).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends,
        probe_interval_ms = config.health_check.interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
