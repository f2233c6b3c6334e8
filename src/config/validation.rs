//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend URLs are plain HTTP with a host
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - An empty backend list is accepted (every request gets a 503)

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::BalancerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("backend {url:?} is not a valid URL: {reason}")]
    BackendUrl { url: String, reason: String },

    #[error("backend {0:?} must use the http scheme")]
    BackendScheme(String),

    #[error("backend {0:?} has no host")]
    BackendHost(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    for raw in &config.backends {
        match Url::parse(raw) {
            Ok(url) => {
                if url.scheme() != "http" {
                    errors.push(ValidationError::BackendScheme(raw.clone()));
                }
                if url.host_str().is_none() {
                    errors.push(ValidationError::BackendHost(raw.clone()));
                }
            }
            Err(e) => errors.push(ValidationError::BackendUrl {
                url: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::Zero("health_check.interval_secs"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::Zero("health_check.timeout_secs"));
    }
    if config.proxy.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("proxy.max_body_bytes"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BindAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
