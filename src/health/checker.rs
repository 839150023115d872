//! Per-backend recovery checker.
//!
//! # Responsibilities
//! - Probe one down backend on a fixed interval
//! - Mark it up on the first successful probe, then exit
//!
//! # Design Decisions
//! - No backoff and no retry limit: downtime is unbounded
//! - Holds only a weak pool reference; exits once the pool is gone
//! - Spawned and supervised by the pool (see `ServerPool::mark_down`)

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::probe::Probe;
use crate::load_balancer::{Backend, ServerPool};
use crate::observability::metrics;

pub struct HealthChecker {
    pool: Weak<ServerPool>,
    backend: Arc<Backend>,
    probe: Probe,
    interval: Duration,
}

impl HealthChecker {
    pub fn new(pool: Weak<ServerPool>, backend: Arc<Backend>, probe: Probe, interval: Duration) -> Self {
        Self {
            pool,
            backend,
            probe,
            interval,
        }
    }

    pub async fn run(self) {
        tracing::debug!(
            backend = %self.backend.address(),
            interval_ms = self.interval.as_millis() as u64,
            probe = ?self.probe.kind(),
            "Health checker starting"
        );

        // First probe one interval after the failure, not immediately.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if self.pool.strong_count() == 0 {
                tracing::debug!(backend = %self.backend.address(), "Pool dropped, health checker exiting");
                return;
            }

            let reachable = self.probe.check(&self.backend).await;
            metrics::record_health_check(self.backend.address(), reachable);

            if reachable {
                if let Some(pool) = self.pool.upgrade() {
                    pool.mark_up(&self.backend);
                }
                return;
            }
        }
    }
}
