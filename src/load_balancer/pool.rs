//! Server pool.
//!
//! # Responsibilities
//! - Own the ordered, append-only list of backends
//! - Select the next alive backend (round-robin with liveness skip)
//! - Perform liveness transitions and their side effects exactly once
//! - Supervise one health checker per down backend

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::config::{BalancerConfig, HealthCheckConfig, TransportConfig};
use crate::health::{HealthChecker, Probe};
use crate::load_balancer::{
    backend::{normalize_address, parse_address, Backend},
    proxy::{build_client, HttpClient, Proxy},
    round_robin::RoundRobin,
    PoolError,
};
use crate::observability::metrics;

/// Handle to a running health checker.
#[derive(Debug)]
struct CheckerHandle {
    generation: u64,
    abort: AbortHandle,
}

/// Removes the checker's registry entry when its task ends, however it ends.
struct Registration {
    pool: Weak<ServerPool>,
    backend_id: usize,
    generation: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.checkers
                .remove_if(&self.backend_id, |_, handle| handle.generation == self.generation);
        }
    }
}

/// Ordered collection of backends shared by all request handlers.
pub struct ServerPool {
    /// Copy-on-append backend list. Readers never block.
    backends: ArcSwap<Vec<Arc<Backend>>>,
    /// Serializes writers of `backends`.
    append_lock: Mutex<()>,
    selector: RoundRobin,
    client: HttpClient,
    response_timeout: Duration,
    probe: Probe,
    probe_interval: Duration,
    /// Running checkers keyed by backend id.
    checkers: DashMap<usize, CheckerHandle>,
    generation: AtomicU64,
}

impl ServerPool {
    /// Build a pool from an ordered list of addresses.
    ///
    /// Every backend starts alive and shares one connection-reuse transport.
    /// Returns the first address that fails to parse.
    pub fn new<I, S>(
        addresses: I,
        transport: &TransportConfig,
        health: &HealthCheckConfig,
    ) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let client = build_client(transport);
        let response_timeout = Duration::from_secs(transport.response_timeout_secs);

        let mut backends = Vec::new();
        for address in addresses {
            let url = parse_address(address.as_ref())?;
            let proxy = Proxy::new(url.clone(), client.clone(), response_timeout);
            backends.push(Arc::new(Backend::new(backends.len(), url, proxy)));
        }

        for backend in &backends {
            metrics::record_backend_alive(backend.address(), true);
        }
        tracing::info!(backend_count = backends.len(), "Server pool created");

        Ok(Self {
            backends: ArcSwap::from_pointee(backends),
            append_lock: Mutex::new(()),
            selector: RoundRobin::new(),
            client,
            response_timeout,
            probe: Probe::from_config(health),
            probe_interval: Duration::from_millis(health.interval_ms),
            checkers: DashMap::new(),
            generation: AtomicU64::new(0),
        })
    }

    /// Build a pool from the backend list and settings of a full config.
    pub fn from_config(config: &BalancerConfig) -> Result<Self, PoolError> {
        Self::new(&config.backends, &config.transport, &config.health_check)
    }

    /// Validate `address` and append a new alive backend.
    pub fn add_peer(&self, address: &str) -> Result<Arc<Backend>, PoolError> {
        let url = parse_address(address)?;

        let _guard = self.append_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.backends.load_full();

        let proxy = Proxy::new(url.clone(), self.client.clone(), self.response_timeout);
        let backend = Arc::new(Backend::new(current.len(), url, proxy));

        if current.iter().any(|b| b.address() == backend.address()) {
            tracing::warn!(backend = %backend.address(), "Adding duplicate backend address as a separate entry");
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(backend.clone());
        self.backends.store(Arc::new(next));

        metrics::record_backend_alive(backend.address(), true);
        tracing::info!(backend = %backend.address(), id = backend.id(), "Peer added");
        Ok(backend)
    }

    /// Next alive backend in round-robin order, or `None` if all are down.
    pub fn next_backend(&self) -> Option<Arc<Backend>> {
        let backends = self.backends.load();
        let selected = self.selector.next(backends.as_slice());
        if selected.is_none() {
            tracing::debug!(backend_count = backends.len(), "No alive backends");
        }
        selected
    }

    /// Transition `backend` from alive to down.
    ///
    /// Only the caller that performs the transition spawns a health checker.
    /// Returns whether this call performed the transition.
    ///
    /// Outside a Tokio runtime no checker can run, so the transition is
    /// undone and `false` is returned.
    pub fn mark_down(self: &Arc<Self>, backend: &Arc<Backend>) -> bool {
        if !backend.try_set_down() {
            return false;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                backend.try_set_up();
                tracing::error!(
                    backend = %backend.address(),
                    error = %e,
                    "Cannot mark backend down outside a runtime"
                );
                return false;
            }
        };

        tracing::warn!(backend = %backend.address(), "Backend marked down");
        metrics::record_transition(backend.address(), false);
        self.spawn_checker(&runtime, backend.clone());
        true
    }

    /// Transition `backend` from down to alive.
    ///
    /// Returns whether this call performed the transition.
    pub fn mark_up(&self, backend: &Backend) -> bool {
        if !backend.try_set_up() {
            return false;
        }

        tracing::info!(backend = %backend.address(), "Backend recovered");
        metrics::record_transition(backend.address(), true);
        true
    }

    fn spawn_checker(self: &Arc<Self>, runtime: &Handle, backend: Arc<Backend>) {
        let backend_id = backend.id();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let registration = Registration {
            pool: Arc::downgrade(self),
            backend_id,
            generation,
        };
        let checker = HealthChecker::new(
            Arc::downgrade(self),
            backend,
            self.probe.clone(),
            self.probe_interval,
        );

        // The task waits until its handle is registered, so its exit
        // cleanup can never run before the insert.
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let task = runtime.spawn(async move {
            let _registration = registration;
            if registered_rx.await.is_err() {
                return;
            }
            checker.run().await;
        });

        let handle = CheckerHandle {
            generation,
            abort: task.abort_handle(),
        };
        if let Some(stale) = self.checkers.insert(backend_id, handle) {
            stale.abort.abort();
        }
        let _ = registered_tx.send(());
    }

    /// Stop the health checker of one backend, if any is running.
    pub fn cancel_checker(&self, backend_id: usize) -> bool {
        match self.checkers.remove(&backend_id) {
            Some((_, handle)) => {
                handle.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Stop every running health checker.
    pub fn shutdown(&self) {
        let handles: Vec<AbortHandle> = self
            .checkers
            .iter()
            .map(|entry| entry.abort.clone())
            .collect();
        self.checkers.clear();

        for handle in &handles {
            handle.abort();
        }
        tracing::info!(stopped = handles.len(), "Health checkers stopped");
    }

    /// Snapshot of all backends in pool order.
    pub fn backends(&self) -> Arc<Vec<Arc<Backend>>> {
        self.backends.load_full()
    }

    /// First backend whose address equals `address`.
    pub fn find(&self, address: &str) -> Option<Arc<Backend>> {
        let wanted = normalize_address(address);
        self.backends
            .load()
            .iter()
            .find(|b| b.address() == wanted)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alive_count(&self) -> usize {
        self.backends.load().iter().filter(|b| b.is_alive()).count()
    }

    /// Number of health checkers currently running.
    pub fn active_checkers(&self) -> usize {
        self.checkers.len()
    }

    /// Whether a health checker is running for `backend_id`.
    pub fn is_checking(&self, backend_id: usize) -> bool {
        self.checkers.contains_key(&backend_id)
    }
}

impl std::fmt::Debug for ServerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPool")
            .field("backends", &self.backends.load_full())
            .field("cursor", &self.selector.cursor())
            .field("active_checkers", &self.checkers.len())
            .finish()
    }
}
