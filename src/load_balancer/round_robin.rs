//! Round-robin load balancing strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::{
    LoadBalancer,
    backend::{Backend, BackendConnectionGuard},
};

/// Round-robin selector.
/// Stores an internal cursor to rotate through backends, skipping dead ones.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<BackendConnectionGuard> {
        if backends.is_empty() {
            return None;
        }

        let len = backends.len();
        let next = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        for i in 0..len {
            let index = next.wrapping_add(i) % len;
            let backend = &backends[index];
            if backend.is_alive() {
                // Skipped over dead backends: resume from here next time.
                // A lost store only costs fairness.
                if i != 0 {
                    self.cursor.store(index, Ordering::Relaxed);
                }
                return Some(backend.acquire());
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
