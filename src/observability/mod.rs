//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! endpoint selector, checkout sessions:
//!     → logging.rs (structured tracing events, one span per probe cycle)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout / host log sink
//!     → Prometheus scrape (optional, CLI only)
//! ```

pub mod logging;
pub mod metrics;
