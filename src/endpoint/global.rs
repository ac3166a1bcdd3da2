//! Process-wide selector instance.
//!
//! Hosts install one selector at startup; checkout sessions and UI code
//! fetch it from here instead of threading an `Arc` through every layer.

use std::sync::{Arc, OnceLock};

use crate::endpoint::error::{EndpointError, EndpointResult};
use crate::endpoint::selector::EndpointSelector;

static SELECTOR: OnceLock<Arc<EndpointSelector>> = OnceLock::new();

/// Install the process-wide selector. Fails if one is already installed.
pub fn install(selector: Arc<EndpointSelector>) -> EndpointResult<()> {
    SELECTOR.set(selector).map_err(|_| EndpointError::AlreadyInstalled)?;
    tracing::debug!("Process-wide endpoint selector installed");
    Ok(())
}

/// The installed selector, if any.
pub fn selector() -> Option<Arc<EndpointSelector>> {
    SELECTOR.get().cloned()
}
