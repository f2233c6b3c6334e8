//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (fixed, ordered list of backends)
//!     → Apply load balancing algorithm:
//!         - least_conn.rs (pick alive backend with fewest in-flight requests)
//!         - round_robin.rs (rotate, skipping dead backends)
//!     → backend.rs (reserve a connection slot via guard)
//!     → Return guard or None ("no peer available")
//! ```
//!
//! # Design Decisions
//! - Selection and reservation are one step, so concurrent selections see
//!   each other's load
//! - Dead backends are never returned
//! - An empty pool is valid and always yields None

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

use std::sync::Arc;

use crate::config::SelectionPolicy;
use self::backend::{Backend, BackendConnectionGuard};

pub use self::least_conn::LeastConnections;
pub use self::pool::ServerPool;
pub use self::round_robin::RoundRobin;

/// A peer selection policy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick an alive backend and reserve a connection slot on it.
    ///
    /// Returns `None` when `backends` is empty or every backend is dead.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<BackendConnectionGuard>;

    /// Policy name for logs.
    fn name(&self) -> &'static str;
}

/// Build the selector for a configured policy.
pub fn create_load_balancer(policy: SelectionPolicy) -> Box<dyn LoadBalancer> {
    match policy {
        SelectionPolicy::LeastConnections => Box::new(LeastConnections::new()),
        SelectionPolicy::RoundRobin => Box::new(RoundRobin::new()),
    }
}
