//! Payment window endpoint selection and checkout session hosting.

pub mod checkout;
pub mod config;
pub mod endpoint;
pub mod lifecycle;
pub mod observability;

pub use checkout::{CheckoutSession, PaymentRequest, SessionEvent};
pub use config::PaywindowConfig;
pub use endpoint::{EndpointConfig, EndpointEvent, EndpointSelector, HttpProber, Prober};
pub use lifecycle::Shutdown;
