//! Configuration file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::BalancerConfig;
use crate::load_balancer::backend::normalize_address;
use crate::load_balancer::ServerPool;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<BalancerConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BalancerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Apply a reloaded configuration to a running pool.
///
/// The pool is append-only: addresses not yet present are added as peers,
/// addresses that disappeared from the file stay in the pool.
/// Returns the number of peers added.
pub fn apply_backend_update(pool: &ServerPool, config: &BalancerConfig) -> usize {
    let current: Vec<String> = pool.backends().iter().map(|b| b.address().to_string()).collect();
    let mut added = 0;

    for address in &config.backends {
        if pool.find(address).is_some() {
            continue;
        }
        match pool.add_peer(address) {
            Ok(_) => added += 1,
            Err(e) => tracing::error!(error = %e, "Skipping backend from reloaded config"),
        }
    }

    for address in &current {
        let still_listed = config.backends.iter().any(|a| normalize_address(a) == *address);
        if !still_listed {
            tracing::warn!(backend = %address, "Backend removed from config; pool membership is append-only, keeping it");
        }
    }
    added
}
