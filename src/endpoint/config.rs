//! Endpoint configuration snapshot.
//!
//! # Responsibilities
//! - Validate the default payment server URL
//! - Join base URLs with the payment window path
//! - Produce the ordered candidate list for probe cycles

use std::time::Duration;
use url::Url;

use crate::endpoint::error::{EndpointError, EndpointResult};

/// Timeout used when the configured probe timeout is zero.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 2;

/// Immutable endpoint configuration.
///
/// Replaced as a whole on reconfiguration, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Preferred payment server, probed first.
    pub default_base_url: Url,
    /// Path identifying the payment window type, appended to every base URL.
    pub url_path_suffix: String,
    /// Lower-priority servers in configured order.
    pub failover_urls: Vec<Url>,
    /// Per-candidate probe timeout (0 = default).
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Build a configuration from raw strings.
    ///
    /// The default URL must parse and use http(s). Invalid failover URLs are
    /// logged and skipped.
    pub fn new<I, S>(default_base_url: &str, url_path_suffix: &str, failover_urls: I) -> EndpointResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let trimmed = default_base_url.trim();
        if trimmed.is_empty() {
            return Err(EndpointError::Configuration(
                "default base URL must not be empty".to_string(),
            ));
        }

        let default_base_url = parse_base_url(trimmed)?;
        join_path(&default_base_url, url_path_suffix)?;

        let mut failovers = Vec::new();
        for raw in failover_urls {
            let raw = raw.as_ref().trim();
            match parse_base_url(raw).and_then(|url| join_path(&url, url_path_suffix).map(|_| url)) {
                Ok(url) => failovers.push(url),
                Err(e) => tracing::warn!(url = %raw, error = %e, "Ignoring invalid failover payment server URL"),
            }
        }

        Ok(Self {
            default_base_url,
            url_path_suffix: url_path_suffix.to_string(),
            failover_urls: failovers,
            timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
        })
    }

    /// Same configuration with a different probe timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Full URL of the default server (base + path suffix).
    pub fn default_url(&self) -> Url {
        // Validated in `new`.
        join_path(&self.default_base_url, &self.url_path_suffix)
            .unwrap_or_else(|_| self.default_base_url.clone())
    }

    /// Ordered candidates: default first, then failovers in configured order.
    pub fn candidates(&self) -> Vec<Url> {
        std::iter::once(&self.default_base_url)
            .chain(self.failover_urls.iter())
            .filter_map(|base| join_path(base, &self.url_path_suffix).ok())
            .collect()
    }

    /// Effective per-candidate timeout.
    pub fn probe_timeout(&self) -> Duration {
        effective_timeout(self.timeout_secs)
    }
}

/// Map a configured timeout to the one actually used; zero selects the default.
pub fn effective_timeout(timeout_secs: u64) -> Duration {
    if timeout_secs == 0 {
        Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS)
    } else {
        Duration::from_secs(timeout_secs)
    }
}

fn parse_base_url(raw: &str) -> EndpointResult<Url> {
    let url = Url::parse(raw).map_err(|source| EndpointError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(EndpointError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

/// Append the payment window path to a base URL.
///
/// Exactly one slash separates the two parts; query and fragment suffixes are
/// appended verbatim.
pub fn join_path(base: &Url, suffix: &str) -> EndpointResult<Url> {
    if suffix.is_empty() {
        return Ok(base.clone());
    }

    let base_str = base.as_str();
    let joined = if suffix.starts_with('?') || suffix.starts_with('#') {
        format!("{}{}", base_str, suffix)
    } else {
        match (base_str.ends_with('/'), suffix.starts_with('/')) {
            (true, true) => format!("{}{}", base_str, &suffix[1..]),
            (false, false) => format!("{}/{}", base_str, suffix),
            _ => format!("{}{}", base_str, suffix),
        }
    };

    Url::parse(&joined).map_err(|source| EndpointError::InvalidUrl { url: joined, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_keep_configured_order() {
        let config = EndpointConfig::new(
            "https://a.example",
            "/pay",
            ["https://b.example", "https://c.example/"],
        )
        .unwrap();

        let candidates: Vec<String> = config.candidates().iter().map(|u| u.to_string()).collect();
        assert_eq!(
            candidates,
            vec![
                "https://a.example/pay",
                "https://b.example/pay",
                "https://c.example/pay",
            ]
        );
        assert_eq!(config.default_url().as_str(), "https://a.example/pay");
    }

    #[test]
    fn test_empty_suffix_uses_base_verbatim() {
        let config = EndpointConfig::new("https://a.example/pay", "", Vec::<String>::new()).unwrap();
        assert_eq!(config.default_url().as_str(), "https://a.example/pay");
        assert_eq!(config.candidates().len(), 1);
    }

    #[test]
    fn test_join_path_variants() {
        let base = Url::parse("https://a.example/window").unwrap();
        assert_eq!(join_path(&base, "mobile").unwrap().as_str(), "https://a.example/window/mobile");
        assert_eq!(join_path(&base, "/mobile").unwrap().as_str(), "https://a.example/window/mobile");
        assert_eq!(join_path(&base, "?type=pay").unwrap().as_str(), "https://a.example/window?type=pay");

        let slashed = Url::parse("https://a.example/window/").unwrap();
        assert_eq!(join_path(&slashed, "/mobile").unwrap().as_str(), "https://a.example/window/mobile");
    }

    #[test]
    fn test_rejects_bad_default() {
        assert!(matches!(
            EndpointConfig::new("", "/pay", Vec::<String>::new()),
            Err(EndpointError::Configuration(_))
        ));
        assert!(matches!(
            EndpointConfig::new("   ", "/pay", Vec::<String>::new()),
            Err(EndpointError::Configuration(_))
        ));
        assert!(matches!(
            EndpointConfig::new("not a url", "/pay", Vec::<String>::new()),
            Err(EndpointError::InvalidUrl { .. })
        ));
        assert!(matches!(
            EndpointConfig::new("ftp://a.example", "/pay", Vec::<String>::new()),
            Err(EndpointError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_invalid_failovers_are_skipped() {
        let config = EndpointConfig::new(
            "https://a.example",
            "/pay",
            ["::bad::", "https://b.example", "ftp://c.example"],
        )
        .unwrap();
        assert_eq!(config.failover_urls.len(), 1);
        assert_eq!(config.failover_urls[0].as_str(), "https://b.example/");
    }

    #[test]
    fn test_zero_timeout_means_default() {
        let config = EndpointConfig::new("https://a.example", "", Vec::<String>::new())
            .unwrap()
            .with_timeout_secs(0);
        assert_eq!(config.probe_timeout(), Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS));
        assert_eq!(effective_timeout(7), Duration::from_secs(7));
    }
}
