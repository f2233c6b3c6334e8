//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track in-flight requests (for Least Connections LB)
//! - Track liveness (written by health checks and failover)

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Liveness state.
///
/// `Unknown` is the state before the first probe and counts as alive.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Alive = 1,
    Dead = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Alive,
            2 => HealthState::Dead,
            _ => HealthState::Unknown,
        }
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Base URL requests are forwarded to.
    pub url: Url,
    /// `host:port` used for TCP probes and logging.
    pub authority: String,

    /// Requests currently being forwarded to this backend.
    active_connections: AtomicUsize,
    /// Current liveness (see [`HealthState`]).
    state: AtomicU8,
}

impl Backend {
    /// Create a new backend. It starts out alive.
    ///
    /// Returns None for a URL without a host, which has nothing to dial.
    pub fn new(url: Url) -> Option<Self> {
        let host = url.host_str()?;
        let authority = match url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Some(Self {
            url,
            authority,
            active_connections: AtomicUsize::new(0),
            state: AtomicU8::new(HealthState::Unknown as u8),
        })
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement active connection count. Never goes below zero.
    pub fn dec_connections(&self) {
        let result = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if result.is_err() {
            tracing::error!(backend = %self.url, "Connection count decremented below zero");
        }
    }

    /// Reserve a connection slot; the returned guard releases it on drop.
    pub fn acquire(self: &Arc<Self>) -> BackendConnectionGuard {
        self.inc_connections();
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }

    // --- Health Logic ---

    /// Current liveness state.
    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Return true unless the backend has been marked dead.
    pub fn is_alive(&self) -> bool {
        self.state() != HealthState::Dead
    }

    /// Overwrite liveness. Returns the previous state.
    pub fn set_alive(&self, alive: bool) -> HealthState {
        let next = if alive {
            HealthState::Alive
        } else {
            HealthState::Dead
        };
        HealthState::from(self.state.swap(next as u8, Ordering::AcqRel))
    }
}

/// A RAII guard that manages the active connection count.
///
/// Exactly one increment happens when the guard is created and exactly one
/// decrement when it is dropped, whichever path the request takes.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl BackendConnectionGuard {
    /// The backend this guard holds a slot on.
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}
