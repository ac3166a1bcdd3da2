//! Settings management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PaywindowConfig (validated, immutable)
//!     → EndpointsConfig::to_endpoint_config → EndpointSelector
//!
//! On change:
//!     watcher.rs detects modification
//!     → loader.rs loads new settings
//!     → validation.rs validates
//!     → apply_reload swaps the selector's configuration
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require a full reload
//! - All fields except the default server have defaults
//! - Invalid reloads are logged and ignored; the running configuration stays

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{EndpointsConfig, ObservabilityConfig, PaywindowConfig, SessionConfig};
