//! Settings file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::PaywindowConfig;
use crate::endpoint::error::EndpointResult;
use crate::endpoint::EndpointSelector;

/// Watches the settings file and forwards every valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<PaywindowConfig>,
}

impl ConfigWatcher {
    /// Create a watcher and the receiver for settings updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<PaywindowConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?path, "Settings change detected, reloading");
                    match load_config(&path) {
                        Ok(config) => {
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload settings, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Settings watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Settings watcher started");
        Ok(watcher)
    }
}

/// Push reloaded endpoint settings into the selector.
///
/// Returns whether the endpoint configuration changed. Unchanged endpoint
/// settings leave the active endpoint alone.
pub fn apply_reload(
    selector: &EndpointSelector,
    current: &PaywindowConfig,
    reloaded: &PaywindowConfig,
) -> EndpointResult<bool> {
    if current.endpoints == reloaded.endpoints {
        return Ok(false);
    }

    let endpoint_config = reloaded.endpoints.to_endpoint_config()?;
    let previous = selector.config();
    if *previous == endpoint_config {
        return Ok(false);
    }

    if previous.default_base_url == endpoint_config.default_base_url
        && previous.url_path_suffix == endpoint_config.url_path_suffix
        && previous.failover_urls == endpoint_config.failover_urls
    {
        // Only the timeout moved; keep the active endpoint.
        selector.set_probe_timeout(endpoint_config.timeout_secs);
    } else {
        selector.apply_config(endpoint_config);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::HttpProber;
    use std::sync::Arc;

    fn settings(default: &str, timeout: u64) -> PaywindowConfig {
        let mut config = PaywindowConfig::default();
        config.endpoints.default_base_url = default.to_string();
        config.endpoints.url_path = "/pay".to_string();
        config.endpoints.probe_timeout_secs = timeout;
        config
    }

    #[tokio::test]
    async fn test_apply_reload() {
        let current = settings("https://a.example", 2);
        let selector = EndpointSelector::new(
            current.endpoints.to_endpoint_config().unwrap(),
            Arc::new(HttpProber::new().unwrap()),
        )
        .unwrap();

        // Nothing changed.
        assert!(!apply_reload(&selector, &current, &current.clone()).unwrap());

        // Timeout only.
        let slower = settings("https://a.example", 7);
        assert!(apply_reload(&selector, &current, &slower).unwrap());
        assert_eq!(selector.config().timeout_secs, 7);
        assert_eq!(selector.active_url().as_str(), "https://a.example/pay");

        // New default resets the active endpoint.
        let moved = settings("https://z.example", 7);
        assert!(apply_reload(&selector, &slower, &moved).unwrap());
        assert_eq!(selector.active_url().as_str(), "https://z.example/pay");
    }

    #[test]
    fn test_watcher_channel() {
        let (watcher, mut rx) = ConfigWatcher::new(Path::new("paywindow.toml"));
        watcher.update_tx.send(PaywindowConfig::default()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), PaywindowConfig::default());
    }
}
