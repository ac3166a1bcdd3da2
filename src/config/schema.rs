//! Settings file schema.
//!
//! All types derive Serde traits for deserialization from TOML. Every field
//! except `endpoints.default_base_url` has a default.

use serde::{Deserialize, Serialize};

use crate::endpoint::error::EndpointResult;
use crate::endpoint::EndpointConfig;

/// Root settings for the payment window SDK.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct PaywindowConfig {
    /// Payment server candidates and probing.
    pub endpoints: EndpointsConfig,

    /// Checkout session policy.
    pub session: SessionConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Payment server endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Preferred payment server base URL.
    pub default_base_url: String,

    /// Path of the payment window type, appended to every base URL.
    pub url_path: String,

    /// Failover servers, highest priority first.
    pub failover_urls: Vec<String>,

    /// Per-candidate probe timeout in seconds (0 = default of 2).
    pub probe_timeout_secs: u64,

    /// Interval between background refreshes in watch mode.
    pub refresh_interval_secs: u64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            default_base_url: String::new(),
            url_path: String::new(),
            failover_urls: Vec::new(),
            probe_timeout_secs: 2,
            refresh_interval_secs: 60,
        }
    }
}

impl EndpointsConfig {
    /// Build the selector's configuration snapshot.
    pub fn to_endpoint_config(&self) -> EndpointResult<EndpointConfig> {
        Ok(EndpointConfig::new(&self.default_base_url, &self.url_path, &self.failover_urls)?
            .with_timeout_secs(self.probe_timeout_secs))
    }
}

/// Checkout session policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Error codes at or below this value are critical; the host must close the window.
    pub critical_error_max: i64,

    /// Seconds before the payment window shows its own timeout message.
    pub window_timeout_secs: u32,

    /// Payment window language.
    pub language: String,

    /// Mark transactions as test transactions.
    pub test: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            critical_error_max: 10,
            window_timeout_secs: 900,
            language: "en".to_string(),
            test: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Include module targets in log lines.
    pub log_targets: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_targets: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
