//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed, ordered list of backends built at startup
//! - Apply the configured selection policy
//! - Hand out connection guards for tracking

use std::sync::Arc;
use url::Url;

use crate::config::{BalancerConfig, SelectionPolicy};
use crate::load_balancer::{
    LoadBalancer,
    backend::{Backend, BackendConnectionGuard},
    create_load_balancer,
};

/// The server pool: one [`Backend`] per configured URL, in input order.
///
/// The backend list never changes after construction, so it is read without
/// locking. Only per-backend state mutates.
#[derive(Debug)]
pub struct ServerPool {
    backends: Vec<Arc<Backend>>,
    balancer: Box<dyn LoadBalancer>,
}

impl ServerPool {
    /// Create a pool from already parsed backend URLs.
    /// URLs without a host are skipped with a warning.
    pub fn new(urls: Vec<Url>, policy: SelectionPolicy) -> Self {
        let backends = urls
            .into_iter()
            .filter_map(|url| {
                let raw = url.to_string();
                let backend = Backend::new(url);
                if backend.is_none() {
                    tracing::warn!(backend = %raw, "Skipping backend URL without a host");
                }
                backend.map(Arc::new)
            })
            .collect();

        Self {
            backends,
            balancer: create_load_balancer(policy),
        }
    }

    /// Create a pool from validated configuration.
    pub fn from_config(config: &BalancerConfig) -> Self {
        let mut urls = Vec::with_capacity(config.backends.len());
        for raw in &config.backends {
            match Url::parse(raw) {
                Ok(url) => urls.push(url),
                Err(e) => tracing::warn!(backend = %raw, error = %e, "Skipping invalid backend URL"),
            }
        }

        let pool = Self::new(urls, config.policy);
        tracing::info!(
            backends = pool.len(),
            policy = pool.balancer.name(),
            "Server pool created"
        );
        pool
    }

    /// Select an alive backend and reserve a connection slot on it.
    /// Returns None when no backend is alive (or the pool is empty).
    pub fn next_peer(&self) -> Option<BackendConnectionGuard> {
        let peer = self.balancer.next_server(&self.backends);
        if peer.is_none() {
            tracing::debug!(backend_count = self.backends.len(), "No alive backend in pool");
            for b in &self.backends {
                tracing::debug!(backend = %b.url, state = ?b.state(), "Backend status");
            }
        }
        peer
    }

    /// All backends in pool order (for health checking).
    pub fn all_backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Number of backends currently believed alive.
    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }

    /// Policy name for logs.
    pub fn policy_name(&self) -> &'static str {
        self.balancer.name()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
