//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BalancerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Ordered list of backend base URLs (e.g. "http://127.0.0.1:8081").
    pub backends: Vec<String>,

    /// Peer selection policy.
    pub policy: SelectionPolicy,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Forwarding settings.
    pub proxy: ForwardConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Which algorithm picks the next backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Fewest in-flight requests wins, ties go to pool order.
    #[default]
    LeastConnections,
    /// Rotate through the pool, skipping dead backends.
    RoundRobin,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Seconds between two scans of the pool.
    pub interval_secs: u64,

    /// TCP connect timeout per probe in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 2,
        }
    }
}

/// Request forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwardConfig {
    /// Largest request body buffered for forwarding (and the one retry).
    pub max_body_bytes: usize,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// The compact endpoints file: a listen port plus the backend URLs.
///
/// ```json
/// { "lbport": ":8080", "servers": ["http://localhost:8081"] }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EndPoints {
    /// Listen port, either ":PORT" or a full "host:port".
    pub lbport: String,
    /// Backend base URLs, in pool order.
    pub servers: Vec<String>,
}

impl From<EndPoints> for BalancerConfig {
    fn from(endpoints: EndPoints) -> Self {
        let bind_address = if endpoints.lbport.starts_with(':') {
            format!("0.0.0.0{}", endpoints.lbport)
        } else {
            endpoints.lbport
        };

        Self {
            listener: ListenerConfig { bind_address },
            backends: endpoints.servers,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_port_only_binds_all_interfaces() {
        let config = BalancerConfig::from(EndPoints {
            lbport: ":8080".into(),
            servers: vec!["http://localhost:8081".into()],
        });
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.backends, vec!["http://localhost:8081".to_string()]);
        assert_eq!(config.policy, SelectionPolicy::LeastConnections);
    }

    #[test]
    fn endpoints_full_address_kept() {
        let config = BalancerConfig::from(EndPoints {
            lbport: "127.0.0.1:9000".into(),
            servers: vec![],
        });
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert!(config.backends.is_empty());
    }

    #[test]
    fn health_defaults() {
        let hc = HealthCheckConfig::default();
        assert!(hc.enabled);
        assert_eq!(hc.interval_secs, 10);
        assert_eq!(hc.timeout_secs, 2);
    }
}
