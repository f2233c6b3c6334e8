//! Least Connections load balancing strategy.

use std::sync::Arc;
use crate::load_balancer::{
    LoadBalancer,
    backend::{Backend, BackendConnectionGuard},
};

/// Least connections selector.
/// Selects the alive backend with the minimum number of active connections
/// and reserves a slot on it before returning.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<BackendConnectionGuard> {
        // In case of tie, the first one is selected (stability)
        backends
            .iter()
            .filter(|b| b.is_alive())
            .min_by_key(|b| b.active_connections())
            .map(|b| b.acquire())
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}
