//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Immediate scan, then periodic timer
//!     → TCP connect to each backend (bounded by timeout)
//!     → set_alive(true/false)
//!
//! Failover (http/failover.rs):
//!     Forwarding error observed
//!     → set_alive(false) on the failing backend
//! ```
//!
//! # Design Decisions
//! - Full scan every interval, probes run concurrently
//! - A failed probe only flips liveness; it is retried next scan
//! - Health state is per-backend, not per-pool

pub mod active;

pub use active::{probe, HealthMonitor};
