//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (delays ordered, sizes > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::GatewayConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &'static str, message: String| errors.push(ValidationError { field, message });

    check_addr(&mut fail, "listener.bind_address", &config.listener.bind_address);
    check_addr(&mut fail, "store.bind_address", &config.store.bind_address);
    if config.observability.metrics_enabled {
        check_addr(&mut fail, "observability.metrics_address", &config.observability.metrics_address);
    }

    let retry = &config.snapshot_retry;
    if retry.max_attempts == 0 {
        fail("snapshot_retry.max_attempts", "must be at least 1".to_string());
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        fail(
            "snapshot_retry.base_delay_ms",
            format!("{} exceeds max_delay_ms {}", retry.base_delay_ms, retry.max_delay_ms),
        );
    }
    if config.gateway.max_body_size == 0 {
        fail("gateway.max_body_size", "must be greater than 0".to_string());
    }
    if !matches!(config.gateway.scheme.as_str(), "http" | "https") {
        fail("gateway.scheme", format!("'{}' is not http or https", config.gateway.scheme));
    }
    if config.timeouts.request_secs == 0 {
        fail("timeouts.request_secs", "must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(fail: &mut impl FnMut(&'static str, String), field: &'static str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        fail(field, format!("'{}' is not a socket address: {}", value, e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.snapshot_retry.max_attempts = 0;
        config.snapshot_retry.base_delay_ms = 5_000;
        config.gateway.scheme = "ftp".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "snapshot_retry.max_attempts",
                "snapshot_retry.base_delay_ms",
                "gateway.scheme"
            ]
        );
    }
}
