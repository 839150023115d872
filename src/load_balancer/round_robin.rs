//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Round-robin selector.
/// Owns the shared cursor used to rotate through backends. The cursor starts at
/// zero and is never reset.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor value.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Pick the next alive backend.
    ///
    /// Makes at most `backends.len()` attempts; every attempt claims a fresh
    /// cursor value, so concurrent callers never share one.
    pub fn next(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        for _ in 0..len {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % len;
            let backend = &backends[index];
            if backend.is_alive() {
                return Some(backend.clone());
            }
        }
        None
    }
}
