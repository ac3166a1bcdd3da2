//! Checkout session host.
//!
//! # Responsibilities
//! - Snapshot the active payment server URL when a session starts
//! - Hand the presentation surface what to load (URL, form body, content type)
//! - Turn document-load and window callbacks into lifecycle events for one listener
//!
//! # Data Flow
//! ```text
//! EndpointSelector::active_url() ──▶ CheckoutSession::start ──▶ load_request()
//!                                                                  │
//!            presentation surface (loads, fails, callbacks) ◀──────┘
//!                                  │
//!                                  ▼
//!           document_loaded / document_failed / cancel / callback
//!                                  │
//!                                  ▼
//!                     SessionListener::on_event(SessionEvent)
//! ```
//!
//! # Design Decisions
//! - The URL is captured once; later endpoint switches do not affect a running session
//! - Terminal events move the session to `Finished`; anything after that is dropped
//! - Critical errors are reported, closing the window is up to the host

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::mpsc;
use url::{form_urlencoded, Url};
use uuid::Uuid;

use crate::checkout::request::{PaymentRequest, RequestError, FORM_CONTENT_TYPE};
use crate::config::SessionConfig;
use crate::endpoint::EndpointSelector;
use crate::observability::metrics;

/// Parameter carrying the transaction ID in window callbacks.
const TRANSACTION_PARAM: &str = "transact";

/// Parameters the payment window passes back on accept or cancel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallbackParams(BTreeMap<String, String>);

impl CallbackParams {
    /// Parse a form or query string. A leading `?` is ignored.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self(
            form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.get(TRANSACTION_PARAM)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for CallbackParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lifecycle signal delivered to the session listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    WindowLoaded,
    WindowLoadFailed { reason: String },
    CancelUrlLoaded,
    PaymentCancelled { params: CallbackParams },
    PaymentAccepted { params: CallbackParams },
    Error { code: i64, message: String },
}

impl SessionEvent {
    fn kind(&self) -> &'static str {
        match self {
            SessionEvent::WindowLoaded => "window_loaded",
            SessionEvent::WindowLoadFailed { .. } => "window_load_failed",
            SessionEvent::CancelUrlLoaded => "cancel_url_loaded",
            SessionEvent::PaymentCancelled { .. } => "payment_cancelled",
            SessionEvent::PaymentAccepted { .. } => "payment_accepted",
            SessionEvent::Error { .. } => "error",
        }
    }
}

/// Receiver of session lifecycle events.
pub trait SessionListener: Send {
    fn on_event(&mut self, event: SessionEvent);
}

impl SessionListener for mpsc::UnboundedSender<SessionEvent> {
    fn on_event(&mut self, event: SessionEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Session listener channel closed");
        }
    }
}

/// Callback raised by the payment window page itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowCallback {
    Accepted(CallbackParams),
    Cancelled(CallbackParams),
    Error { code: i64, message: String },
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Cancelled,
    LoadFailed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Payment window requested, not yet shown.
    Loading,
    /// Payment window shown.
    Loaded,
    /// Cancel URL requested after the user cancelled.
    Cancelling,
    Finished(Outcome),
}

/// What the presentation surface must load to show the payment window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadRequest {
    pub url: Url,
    pub content_type: &'static str,
    pub body: String,
}

/// One payment window session.
pub struct CheckoutSession<L: SessionListener> {
    id: Uuid,
    url: Url,
    request: PaymentRequest,
    listener: L,
    state: SessionState,
    critical_error_max: i64,
}

impl<L: SessionListener> CheckoutSession<L> {
    /// Start a session against the selector's current active endpoint.
    pub fn start(
        selector: &EndpointSelector,
        mut request: PaymentRequest,
        listener: L,
        settings: &SessionConfig,
    ) -> Result<Self, RequestError> {
        request.apply_defaults(settings);
        Self::with_url(selector.active_url(), request, listener, settings.critical_error_max)
    }

    /// Start a session against an explicit URL.
    pub fn with_url(
        url: Url,
        request: PaymentRequest,
        listener: L,
        critical_error_max: i64,
    ) -> Result<Self, RequestError> {
        request.validate()?;
        let id = Uuid::new_v4();
        tracing::info!(
            session_id = %id,
            url = %url,
            order_id = %request.flow.order_id(),
            "Checkout session started"
        );
        Ok(Self {
            id,
            url,
            request,
            listener,
            state: SessionState::Loading,
            critical_error_max,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// URL captured at start.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &PaymentRequest {
        &self.request
    }

    pub fn cancel_url(&self) -> Option<&str> {
        self.request.cancel_url.as_deref()
    }

    pub fn set_cancel_url(&mut self, cancel_url: Option<String>) {
        self.request.cancel_url = cancel_url;
    }

    /// POST the surface must issue to show the payment window.
    pub fn load_request(&self) -> Result<LoadRequest, RequestError> {
        Ok(LoadRequest {
            url: self.url.clone(),
            content_type: FORM_CONTENT_TYPE,
            body: self.request.post_data()?,
        })
    }

    /// Whether an error code must terminate the session.
    pub fn is_critical(&self, code: i64) -> bool {
        code <= self.critical_error_max
    }

    /// The surface finished loading a document.
    pub fn document_loaded(&mut self, url: &Url) {
        match self.state {
            SessionState::Loading => {
                self.state = SessionState::Loaded;
                self.emit(SessionEvent::WindowLoaded);
            }
            SessionState::Cancelling => {
                tracing::debug!(session_id = %self.id, url = %url, "Cancel URL loaded");
                self.emit(SessionEvent::CancelUrlLoaded);
                self.finish(
                    Outcome::Cancelled,
                    SessionEvent::PaymentCancelled {
                        params: CallbackParams::default(),
                    },
                );
            }
            SessionState::Loaded => {
                tracing::debug!(session_id = %self.id, url = %url, "Navigation inside payment window");
            }
            SessionState::Finished(_) => self.dropped("document_loaded"),
        }
    }

    /// The surface failed to load a document.
    pub fn document_failed(&mut self, reason: &str) {
        match self.state {
            SessionState::Loading => {
                tracing::warn!(session_id = %self.id, reason = %reason, "Payment window failed to load");
                self.finish(
                    Outcome::LoadFailed,
                    SessionEvent::WindowLoadFailed {
                        reason: reason.to_string(),
                    },
                );
            }
            SessionState::Cancelling => {
                tracing::warn!(session_id = %self.id, reason = %reason, "Cancel URL failed to load");
                self.finish(
                    Outcome::Cancelled,
                    SessionEvent::PaymentCancelled {
                        params: CallbackParams::default(),
                    },
                );
            }
            SessionState::Loaded => {
                tracing::warn!(session_id = %self.id, reason = %reason, "Navigation inside payment window failed");
            }
            SessionState::Finished(Outcome::LoadFailed) => {
                tracing::debug!(session_id = %self.id, "Repeated load failure ignored");
            }
            SessionState::Finished(_) => self.dropped("document_failed"),
        }
    }

    /// The user cancelled from the host UI.
    ///
    /// Returns the cancel URL the surface must load before the session ends,
    /// or `None` when the session ended immediately.
    pub fn cancel(&mut self) -> Option<Url> {
        match self.state {
            SessionState::Loaded => {
                match self.cancel_url().map(Url::parse) {
                    Some(Ok(url)) => {
                        tracing::info!(session_id = %self.id, cancel_url = %url, "Loading cancel URL");
                        self.state = SessionState::Cancelling;
                        return Some(url);
                    }
                    Some(Err(e)) => {
                        tracing::warn!(session_id = %self.id, error = %e, "Invalid cancel URL, cancelling directly");
                    }
                    None => {}
                }
                self.finish(
                    Outcome::Cancelled,
                    SessionEvent::PaymentCancelled {
                        params: CallbackParams::default(),
                    },
                );
                None
            }
            SessionState::Loading => {
                self.finish(
                    Outcome::Cancelled,
                    SessionEvent::PaymentCancelled {
                        params: CallbackParams::default(),
                    },
                );
                None
            }
            SessionState::Cancelling => None,
            SessionState::Finished(_) => {
                self.dropped("cancel");
                None
            }
        }
    }

    /// A callback raised by the payment window page.
    ///
    /// Returns `true` for a critical error the host must react to by closing the window.
    pub fn callback(&mut self, callback: WindowCallback) -> bool {
        if let SessionState::Finished(_) = self.state {
            self.dropped("callback");
            return false;
        }

        match callback {
            WindowCallback::Accepted(params) => {
                tracing::info!(
                    session_id = %self.id,
                    transaction_id = params.transaction_id().unwrap_or("-"),
                    "Payment accepted"
                );
                self.finish(Outcome::Accepted, SessionEvent::PaymentAccepted { params });
                false
            }
            WindowCallback::Cancelled(params) => {
                tracing::info!(session_id = %self.id, "Payment cancelled in window");
                self.finish(Outcome::Cancelled, SessionEvent::PaymentCancelled { params });
                false
            }
            WindowCallback::Error { code, message } => {
                let critical = self.is_critical(code);
                tracing::warn!(session_id = %self.id, code, critical, message = %message, "Payment window error");
                self.emit(SessionEvent::Error { code, message });
                critical
            }
        }
    }

    /// The host closed the window.
    pub fn close(&mut self) {
        if !matches!(self.state, SessionState::Finished(_)) {
            tracing::info!(session_id = %self.id, "Checkout session closed by host");
            self.state = SessionState::Finished(Outcome::Closed);
        }
    }

    fn finish(&mut self, outcome: Outcome, event: SessionEvent) {
        self.state = SessionState::Finished(outcome);
        self.emit(event);
    }

    fn emit(&mut self, event: SessionEvent) {
        metrics::record_session_event(event.kind());
        self.listener.on_event(event);
    }

    fn dropped(&self, signal: &'static str) {
        tracing::warn!(session_id = %self.id, signal, "Signal after session finished dropped");
    }
}

impl<L: SessionListener> std::fmt::Debug for CheckoutSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .finish()
    }
}
