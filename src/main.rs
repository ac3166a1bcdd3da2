//! `paywindow` command-line tool.
//!
//! # Architecture Overview
//!
//! ```text
//!   paywindow.toml ──▶ config (load, validate, watch)
//!                          │
//!                          ▼
//!                 ┌──────────────────┐   probes    ┌──────────────────┐
//!                 │ EndpointSelector │ ──────────▶ │ payment servers  │
//!                 │  (active URL)    │ ◀────────── │ default+failover │
//!                 └────────┬─────────┘             └──────────────────┘
//!                          │ active_url() snapshot
//!                          ▼
//!                 ┌──────────────────┐
//!                 │ CheckoutSession  │ ──▶ LoadRequest (URL + form body)
//!                 └──────────────────┘
//! ```
//!
//! # Commands
//! - `probe`: run one probe cycle and print the outcome as JSON
//! - `watch`: refresh periodically and hot-reload settings until Ctrl+C
//! - `session`: print the load request for a purchase

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use paywindow::checkout::{CheckoutSession, PaymentRequest, SessionEvent};
use paywindow::config::loader::load_config;
use paywindow::config::watcher::{apply_reload, ConfigWatcher};
use paywindow::config::PaywindowConfig;
use paywindow::endpoint::{global, EndpointEvent, EndpointSelector, HttpProber};
use paywindow::lifecycle::Shutdown;
use paywindow::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "paywindow", version)]
#[command(about = "Payment server endpoint selection and checkout tooling", long_about = None)]
struct Cli {
    /// Settings file.
    #[arg(short, long, default_value = "paywindow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe all payment servers once and report the active endpoint
    Probe,
    /// Keep the active endpoint fresh and follow settings changes
    Watch,
    /// Build the payment window load request for a purchase
    Session {
        #[arg(long)]
        merchant: String,
        #[arg(long)]
        order_id: String,
        /// Amount in the smallest currency unit.
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "DKK")]
        currency: String,
        #[arg(long, value_delimiter = ',', default_value = "VISA,MC")]
        pay_types: Vec<String>,
        #[arg(long)]
        cancel_url: Option<String>,
        /// Probe before building the request instead of using the default server.
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability);

    tracing::info!(
        config = ?cli.config,
        default = %config.endpoints.default_base_url,
        failovers = config.endpoints.failover_urls.len(),
        "paywindow v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let selector = EndpointSelector::new(
        config.endpoints.to_endpoint_config()?,
        Arc::new(HttpProber::new()?),
    )?;
    global::install(selector.clone())?;

    match cli.command {
        Commands::Probe => probe(&selector).await?,
        Commands::Watch => watch(&selector, cli.config, config).await?,
        Commands::Session {
            merchant,
            order_id,
            amount,
            currency,
            pay_types,
            cancel_url,
            refresh,
        } => {
            if refresh {
                selector.refresh_and_wait().await;
            }
            let pay_types: Vec<&str> = pay_types.iter().map(String::as_str).collect();
            let mut request = PaymentRequest::purchase(merchant, order_id, amount, currency, &pay_types);
            request.cancel_url = cancel_url;
            session(&selector, request, &config)?;
        }
    }

    Ok(())
}

async fn probe(selector: &Arc<EndpointSelector>) -> Result<(), Box<dyn std::error::Error>> {
    let event = selector.refresh_and_wait().await;
    let config = selector.config();
    let report = serde_json::json!({
        "outcome": event,
        "candidates": config.candidates(),
        "timeout_secs": config.probe_timeout().as_secs(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let EndpointEvent::UpdateFailed { .. } = event {
        std::process::exit(1);
    }
    Ok(())
}

async fn watch(
    selector: &Arc<EndpointSelector>,
    path: PathBuf,
    mut current: PaywindowConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();
    let mut shutdown_rx = shutdown.subscribe();

    let (watcher, mut updates) = ConfigWatcher::new(&path);
    let _watcher = watcher.run()?;

    let mut events = selector.subscribe();
    let mut ticker = tokio::time::interval(refresh_interval(&current));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                selector.refresh_active_endpoint();
            }
            event = events.recv() => match event {
                Ok(EndpointEvent::Updated { active }) => {
                    tracing::info!(active = %active, "Active endpoint updated");
                }
                Ok(EndpointEvent::UpdateFailed { retained }) => {
                    tracing::warn!(retained = %retained, "No payment server reachable");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Endpoint event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            },
            Some(reloaded) = updates.recv() => {
                match apply_reload(selector, &current, &reloaded) {
                    Ok(true) => {
                        tracing::info!("Endpoint settings reloaded");
                        selector.refresh_active_endpoint();
                    }
                    Ok(false) => tracing::debug!("Settings reloaded, endpoints unchanged"),
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded endpoint settings");
                        continue;
                    }
                }
                if reloaded.endpoints.refresh_interval_secs != current.endpoints.refresh_interval_secs {
                    ticker = tokio::time::interval(refresh_interval(&reloaded));
                }
                current = reloaded;
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    drop(shutdown_rx);
    tracing::info!(
        pending_listeners = shutdown.receiver_count(),
        "Shutdown complete"
    );
    Ok(())
}

fn refresh_interval(config: &PaywindowConfig) -> Duration {
    Duration::from_secs(config.endpoints.refresh_interval_secs.max(1))
}

fn session(
    selector: &EndpointSelector,
    request: PaymentRequest,
    config: &PaywindowConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
    let session = CheckoutSession::start(selector, request, tx, &config.session)?;
    let report = serde_json::json!({
        "session_id": session.id(),
        "load_request": session.load_request()?,
        "mac_message": session.request().mac_message()?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
