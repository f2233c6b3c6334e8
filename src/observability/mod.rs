//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Health monitor, dispatcher, failover produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - One log line per backend per health scan
//! - One log line per forwarding decision, carrying the request ID
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
