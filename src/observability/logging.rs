//! Structured logging setup.
//!
//! `RUST_LOG` wins over the configured level so operators can raise
//! verbosity without editing the settings file.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(config.log_targets))
        .try_init();

    if let Err(e) = installed {
        // Already installed (tests, embedding hosts); keep theirs.
        tracing::debug!(error = %e, "Tracing subscriber already set");
    }
}

fn default_directive(level: &str) -> String {
    format!("paywindow={level},reqwest=warn,hyper=warn")
}
