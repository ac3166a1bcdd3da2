//! Settings validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: PaywindowConfig → Result<(), Vec<ValidationError>>
//! - Runs before settings are applied to the selector

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::checkout::request::DEFAULT_LANGUAGES;
use crate::config::schema::PaywindowConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the settings file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("endpoints.default_base_url must not be empty")]
    MissingDefaultUrl,

    #[error("{field}: '{value}' is not a valid http(s) URL")]
    InvalidUrl { field: String, value: String },

    #[error("observability.log_level: unknown level '{0}'")]
    InvalidLogLevel(String),

    #[error("observability.metrics_address: '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("endpoints.refresh_interval_secs must be greater than zero")]
    ZeroRefreshInterval,

    #[error("session.language: '{0}' is not offered by the payment window")]
    UnsupportedLanguage(String),
}

/// Check the settings for semantic errors.
pub fn validate_config(config: &PaywindowConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let endpoints = &config.endpoints;

    if endpoints.default_base_url.trim().is_empty() {
        errors.push(ValidationError::MissingDefaultUrl);
    } else if !is_http_url(&endpoints.default_base_url) {
        errors.push(ValidationError::InvalidUrl {
            field: "endpoints.default_base_url".to_string(),
            value: endpoints.default_base_url.clone(),
        });
    }

    for (i, url) in endpoints.failover_urls.iter().enumerate() {
        if !is_http_url(url) {
            errors.push(ValidationError::InvalidUrl {
                field: format!("endpoints.failover_urls[{i}]"),
                value: url.clone(),
            });
        }
    }

    if endpoints.refresh_interval_secs == 0 {
        errors.push(ValidationError::ZeroRefreshInterval);
    }

    if !DEFAULT_LANGUAGES.contains(&config.session.language.as_str()) {
        errors.push(ValidationError::UnsupportedLanguage(config.session.language.clone()));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
