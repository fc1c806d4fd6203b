//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the admission gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admission control limits.
    pub admission: AdmissionConfig,

    /// How caller keys are derived from requests.
    pub key_extraction: KeyExtractionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Admission control configuration.
///
/// Read once at startup; changing it means building a new policy, which
/// starts from empty counters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Enable admission control. When off, every request passes through.
    pub enabled: bool,

    /// Only paths starting with this prefix are subject to admission control.
    pub protected_prefix: String,

    /// Length of the request-counting window in seconds.
    pub window_secs: u64,

    /// Maximum requests per key per window.
    pub request_limit: u64,

    /// Length of the slowdown window in seconds.
    pub slowdown_window_secs: u64,

    /// Requests per window admitted without delay.
    pub delay_after: u64,

    /// Delay added per request past `delay_after`, in milliseconds.
    pub delay_increment_ms: u64,

    /// Optional ceiling on a single delay, in milliseconds. Unset means no cap.
    pub max_delay_ms: Option<u64>,

    /// Entries idle this long are evicted. Defaults to twice the window.
    pub idle_eviction_secs: u64,

    /// How often the eviction sweep runs.
    pub sweep_interval_secs: u64,

    /// Optional cap on distinct tracked keys. While the store is full, each
    /// request from an unseen key scans every entry looking for a stale one
    /// to displace, so large caps under heavy key churn cost O(max_keys) per
    /// such request.
    pub max_keys: Option<usize>,

    /// Human-readable message returned with 429 responses.
    pub reject_message: String,
}

impl AdmissionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn slowdown_window(&self) -> Duration {
        Duration::from_secs(self.slowdown_window_secs)
    }

    pub fn delay_increment(&self) -> Duration {
        Duration::from_millis(self.delay_increment_ms)
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_ms.map(Duration::from_millis)
    }

    pub fn idle_eviction(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protected_prefix: "/api/".to_string(),
            window_secs: 15 * 60,
            request_limit: 100,
            slowdown_window_secs: 15 * 60,
            delay_after: 50,
            delay_increment_ms: 500,
            max_delay_ms: None,
            idle_eviction_secs: 30 * 60,
            sweep_interval_secs: 15 * 60,
            max_keys: None,
            reject_message: "Too many requests from this IP, please try again in 15 minutes."
                .to_string(),
        }
    }
}

/// Caller key derivation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyExtractionConfig {
    /// Use the left-most X-Forwarded-For entry. Only safe behind a trusted proxy.
    pub trust_forwarded_for: bool,

    /// IPv6 clients are grouped by this prefix length.
    pub ipv6_prefix_len: u8,
}

impl Default for KeyExtractionConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_for: false,
            ipv6_prefix_len: 64,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Handler timeout in seconds. Admission delays are not counted.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Deployment environment reported by the health endpoint.
    pub environment: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            environment: "development".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_policy() {
        let config = GateConfig::default();
        assert_eq!(config.admission.window(), Duration::from_secs(900));
        assert_eq!(config.admission.request_limit, 100);
        assert_eq!(config.admission.delay_after, 50);
        assert_eq!(config.admission.delay_increment(), Duration::from_millis(500));
        assert_eq!(config.admission.max_delay(), None);
        assert_eq!(config.admission.idle_eviction(), config.admission.window() * 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GateConfig = toml::from_str(
            r#"
            [admission]
            request_limit = 5
            max_delay_ms = 2000

            [key_extraction]
            trust_forwarded_for = true
            "#,
        )
        .unwrap();

        assert_eq!(config.admission.request_limit, 5);
        assert_eq!(config.admission.max_delay(), Some(Duration::from_secs(2)));
        assert_eq!(config.admission.delay_after, 50);
        assert!(config.key_extraction.trust_forwarded_for);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }
}
