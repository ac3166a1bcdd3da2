//! Active payment server selection.
//!
//! # Responsibilities
//! - Hold the endpoint configuration and the active payment URL
//! - Run probe cycles in the background and switch to the best candidate
//! - Notify subscribers exactly once per completed cycle
//!
//! # Concurrency
//! ```text
//! active_url()   ── lock-free load (ArcSwap) ──────────────▶ Url
//! configure()    ─┐
//! set_timeout()  ─┼─▶ writer lock ─▶ config / active store
//! cycle complete ─┘                  └─▶ broadcast EndpointEvent
//! ```
//!
//! # Design Decisions
//! - One cycle at a time; refreshes during a cycle coalesce into it
//! - Every write (and the event that reports it) happens under the writer
//!   lock, so subscribers see events in write order
//! - A cycle that raced a reconfiguration is rerun on the new configuration
//!   instead of publishing a result for servers no longer configured
//! - A failed cycle keeps the previous endpoint

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::endpoint::config::EndpointConfig;
use crate::endpoint::error::{EndpointError, EndpointResult};
use crate::endpoint::probe::{first_reachable, Prober};
use crate::observability::metrics;

const EVENT_CAPACITY: usize = 16;

/// Terminal signal of a probe cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EndpointEvent {
    /// A candidate answered; `active` is now the active endpoint.
    Updated { active: Url },
    /// No candidate answered; `retained` stays active.
    UpdateFailed { retained: Url },
}

/// What `refresh_active_endpoint` did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// A new probe cycle was spawned.
    Started,
    /// A cycle was already running; its signal answers this request too.
    Coalesced,
}

#[derive(Debug, Default)]
struct WriterState {
    /// Bumped on every reconfiguration.
    epoch: u64,
}

/// Selects the payment server used by new checkout sessions.
pub struct EndpointSelector {
    config: ArcSwap<EndpointConfig>,
    active: ArcSwap<Url>,
    writer: Mutex<WriterState>,
    in_flight: AtomicBool,
    prober: Arc<dyn Prober>,
    events: broadcast::Sender<EndpointEvent>,
    runtime: Handle,
}

impl EndpointSelector {
    /// Create a selector that spawns probe cycles on the current tokio runtime.
    pub fn new(config: EndpointConfig, prober: Arc<dyn Prober>) -> EndpointResult<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| EndpointError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(config, prober, runtime))
    }

    /// Create a selector bound to an explicit runtime handle.
    pub fn with_runtime(config: EndpointConfig, prober: Arc<dyn Prober>, runtime: Handle) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let active = config.default_url();

        tracing::info!(
            default = %active,
            failovers = config.failover_urls.len(),
            timeout_secs = config.probe_timeout().as_secs(),
            "Endpoint selector initialized"
        );

        Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            active: ArcSwap::from_pointee(active),
            writer: Mutex::new(WriterState::default()),
            in_flight: AtomicBool::new(false),
            prober,
            events,
            runtime,
        })
    }

    /// Replace the configuration and reset the active endpoint to the new default.
    ///
    /// The probe timeout currently in effect is kept. No network activity.
    pub fn configure<I, S>(&self, default_base_url: &str, url_path_suffix: &str, failover_urls: I) -> EndpointResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config = EndpointConfig::new(default_base_url, url_path_suffix, failover_urls)?;
        let mut writer = self.lock_writer();
        let config = config.with_timeout_secs(self.config.load().timeout_secs);
        self.replace_locked(&mut writer, config);
        Ok(())
    }

    /// Replace the whole configuration snapshot, timeout included.
    pub fn apply_config(&self, config: EndpointConfig) {
        let mut writer = self.lock_writer();
        self.replace_locked(&mut writer, config);
    }

    fn replace_locked(&self, writer: &mut WriterState, config: EndpointConfig) {
        writer.epoch += 1;
        let default = config.default_url();
        tracing::info!(
            default = %default,
            failovers = config.failover_urls.len(),
            epoch = writer.epoch,
            "Endpoint configuration replaced"
        );
        self.config.store(Arc::new(config));
        self.active.store(Arc::new(default));
    }

    /// Set the per-candidate timeout for future cycles. Zero selects the default.
    pub fn set_probe_timeout(&self, seconds: u64) {
        let _writer = self.lock_writer();
        let mut config = EndpointConfig::clone(&self.config.load());
        config.timeout_secs = seconds;
        tracing::debug!(timeout = ?config.probe_timeout(), "Probe timeout updated");
        self.config.store(Arc::new(config));
    }

    /// The URL new checkout sessions should use. Never blocks.
    pub fn active_url(&self) -> Url {
        Url::clone(&self.active.load())
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<EndpointConfig> {
        self.config.load_full()
    }

    /// True while a probe cycle is running.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Subscribe to cycle outcomes. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.events.subscribe()
    }

    /// Start a probe cycle in the background and return immediately.
    pub fn refresh_active_endpoint(self: &Arc<Self>) -> RefreshStatus {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Probe cycle already running, coalescing refresh");
            metrics::record_refresh_coalesced();
            return RefreshStatus::Coalesced;
        }

        let selector = Arc::clone(self);
        let span = tracing::info_span!("probe_cycle", cycle_id = %Uuid::new_v4());
        self.runtime.spawn(async move { selector.run_cycle().await }.instrument(span));
        RefreshStatus::Started
    }

    /// Refresh and wait for the signal that answers this request.
    pub async fn refresh_and_wait(self: &Arc<Self>) -> EndpointEvent {
        let mut events = self.subscribe();
        self.refresh_active_endpoint();
        loop {
            match events.recv().await {
                Ok(event) => return event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Endpoint event receiver lagged");
                }
                // The sender lives in `self`, which we hold.
                Err(broadcast::error::RecvError::Closed) => {
                    return EndpointEvent::UpdateFailed {
                        retained: self.active_url(),
                    };
                }
            }
        }
    }

    async fn run_cycle(self: Arc<Self>) {
        let mut flag = InFlightFlag::arm(&self.in_flight);

        loop {
            let (epoch, config) = {
                let writer = self.lock_writer();
                (writer.epoch, self.config.load_full())
            };
            let candidates = config.candidates();
            let timeout = config.probe_timeout();

            tracing::info!(candidates = candidates.len(), timeout = ?timeout, "Probe cycle started");
            let winner = first_reachable(self.prober.clone(), &candidates, timeout).await;

            let writer = self.lock_writer();
            if writer.epoch != epoch {
                tracing::info!("Configuration replaced during probe cycle, probing again");
                metrics::record_cycle("restarted");
                continue;
            }

            let event = match winner {
                Some(result) => {
                    let previous = self.active.swap(Arc::new(result.url.clone()));
                    if *previous != result.url {
                        tracing::info!(from = %previous, to = %result.url, index = result.index, "Active payment server switched");
                        metrics::record_endpoint_switch(result.index);
                    } else {
                        tracing::info!(active = %result.url, "Active payment server confirmed");
                    }
                    metrics::record_cycle("updated");
                    EndpointEvent::Updated { active: result.url }
                }
                None => {
                    let retained = self.active_url();
                    tracing::warn!(retained = %retained, "No payment server reachable, keeping current endpoint");
                    metrics::record_cycle("failed");
                    EndpointEvent::UpdateFailed { retained }
                }
            };

            // Cleared before publishing so a subscriber reacting to this event
            // can start the next cycle. The guard must not clear it again.
            flag.release();
            let _ = self.events.send(event);
            drop(writer);
            return;
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag if a cycle task unwinds before releasing it.
struct InFlightFlag<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl<'a> InFlightFlag<'a> {
    fn arm(flag: &'a AtomicBool) -> Self {
        Self { flag, armed: true }
    }

    /// Clear the flag now. Once released, the flag may belong to the next cycle.
    fn release(&mut self) {
        self.armed = false;
        self.flag.store(false, Ordering::Release);
    }
}

impl Drop for InFlightFlag<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for EndpointSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSelector")
            .field("active", &self.active.load().as_str())
            .field("config", &self.config.load_full())
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}
