//! Payment server endpoint selection.
//!
//! # Data Flow
//! ```text
//! Host configuration
//!     → config.rs (validate default, join path, order candidates)
//!     → selector.rs (active endpoint, readable at any time)
//!
//! refresh_active_endpoint():
//!     → probe.rs (all candidates in parallel, each under its timeout)
//!     → lowest-index reachable candidate wins
//!     → selector.rs swaps the active endpoint
//!     → EndpointEvent broadcast (Updated / UpdateFailed)
//!
//! Checkout session start:
//!     → global.rs / selector.active_url() (snapshot)
//! ```
//!
//! # Design Decisions
//! - Priority by configured order, not by response latency
//! - Failed cycles keep the last endpoint that answered
//! - Per-candidate errors are logged, only the cycle outcome is published

pub mod config;
pub mod error;
pub mod global;
pub mod probe;
pub mod selector;

pub use config::EndpointConfig;
pub use error::{EndpointError, ProbeError};
pub use probe::{HttpProber, Prober, ProbeResult};
pub use selector::{EndpointEvent, EndpointSelector, RefreshStatus};
