//! Lifecycle management for long-running modes.
//!
//! # Data Flow
//! ```text
//! Ctrl+C → Shutdown::trigger() → refresh loop and settings watcher stop
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
