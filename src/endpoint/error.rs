//! Endpoint selection error definitions.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced synchronously by the endpoint selector.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Default base URL missing or otherwise unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A URL could not be parsed.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Only http and https payment servers can be probed.
    #[error("Unsupported URL scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },

    /// No tokio runtime available to run probe cycles on.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// The process-wide selector was installed twice.
    #[error("Endpoint selector already installed")]
    AlreadyInstalled,
}

/// Result type for endpoint operations.
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Failure of a single candidate probe.
///
/// Never surfaced on its own; a cycle only reports whether any candidate answered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// No response within the probe timeout.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, DNS failure, TLS failure.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Anything else the HTTP client reported.
    #[error("request failed: {0}")]
    Http(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EndpointError::Configuration("default base URL must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: default base URL must not be empty"
        );

        let err = ProbeError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "probe timed out after 2s");

        let err = EndpointError::UnsupportedScheme {
            url: "ftp://a.example".into(),
            scheme: "ftp".into(),
        };
        assert!(err.to_string().contains("ftp"));
    }
}
