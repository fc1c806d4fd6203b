//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, prefix lengths valid)
//! - Validate addresses before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GateConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("idle_eviction_secs ({idle}) must be at least the longest window ({window})")]
    IdleShorterThanWindow { idle: u64, window: u64 },

    #[error("ipv6_prefix_len {0} exceeds 128")]
    Ipv6PrefixTooLong(u8),

    #[error("protected_prefix {0:?} must start with '/'")]
    PrefixNotAbsolute(String),

    #[error("{field} {value:?} is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let admission = &config.admission;

    let positive = [
        ("admission.window_secs", admission.window_secs),
        ("admission.slowdown_window_secs", admission.slowdown_window_secs),
        ("admission.sweep_interval_secs", admission.sweep_interval_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if admission.max_keys == Some(0) {
        errors.push(ValidationError::Zero { field: "admission.max_keys" });
    }

    // A shorter idle threshold would forget keys mid-window and hand out a
    // fresh quota early.
    let longest_window = admission.window_secs.max(admission.slowdown_window_secs);
    if admission.idle_eviction_secs < longest_window {
        errors.push(ValidationError::IdleShorterThanWindow {
            idle: admission.idle_eviction_secs,
            window: longest_window,
        });
    }

    if config.key_extraction.ipv6_prefix_len > 128 {
        errors.push(ValidationError::Ipv6PrefixTooLong(config.key_extraction.ipv6_prefix_len));
    }

    if !admission.protected_prefix.starts_with('/') {
        errors.push(ValidationError::PrefixNotAbsolute(admission.protected_prefix.clone()));
    }

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

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
