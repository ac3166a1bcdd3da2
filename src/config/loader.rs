//! Settings loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PaywindowConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate settings from a TOML file.
pub fn load_config(path: &Path) -> Result<PaywindowConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate settings from TOML text.
pub fn parse_config(content: &str) -> Result<PaywindowConfig, ConfigError> {
    let config: PaywindowConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("paywindow-loader-{}.toml", std::process::id()));
        fs::write(
            &path,
            r#"
            [endpoints]
            default_base_url = "https://a.example"
            url_path = "/pay"
            probe_timeout_secs = 5

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.endpoints.probe_timeout_secs, 5);
        assert_eq!(config.observability.log_level, "debug");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[endpoints\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_message() {
        let err = parse_config("[endpoints]\nfailover_urls = [\"nope\"]\n").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("default_base_url must not be empty"));
        assert!(message.contains("failover_urls[0]"));
    }
}
