//! Checkout session subsystem.
//!
//! # Data Flow
//! ```text
//! PaymentRequest (request.rs)
//!     → validate, fill session defaults
//!     → CheckoutSession::start (session.rs) snapshots the active endpoint
//!     → LoadRequest { url, form body } for the presentation surface
//!     → surface signals → SessionEvent → listener
//! ```

pub mod request;
pub mod session;

pub use request::{CustomTheme, PaymentFlow, PaymentRequest, RequestError, Theme};
pub use session::{
    CallbackParams, CheckoutSession, LoadRequest, Outcome, SessionEvent, SessionListener, SessionState,
    WindowCallback,
};
