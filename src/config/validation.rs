//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that parse but cannot
//! work at runtime (unparseable addresses, zero limits, empty paths).
//! Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("persistence.path must be set")]
    MissingSinkPath,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.limits.max_request_body_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("limits.max_request_body_bytes"));
    }
    if config.limits.max_response_body_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("limits.max_response_body_bytes"));
    }

    if config.persistence.path.trim().is_empty() {
        errors.push(ValidationError::MissingSinkPath);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
