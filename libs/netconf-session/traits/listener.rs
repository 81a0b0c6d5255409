use crate::core::session::Session;
use crate::traits::NetconfError;
use crate::message::NetconfMessage;
use std::fmt;

/// Why a session was terminated locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationReason {
    reason: String,
}

impl TerminationReason {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Trait for consuming established sessions
///
/// Callbacks are invoked on the session's channel context, except
/// `on_session_terminated`, which runs on the caller of [`Session::close`].
/// They must not block; implementations typically hand work off to their
/// own tasks.
pub trait SessionListener: Send + Sync + 'static {
    /// The session handler was installed and the session is usable
    fn on_session_up(&self, _session: &Session) {}

    /// The peer ended the stream after the session was up
    fn on_session_down(&self, session: &Session, cause: &NetconfError);

    /// The session was closed locally
    fn on_session_terminated(&self, session: &Session, reason: &TerminationReason);

    /// A message arrived on the session
    fn on_message(&self, session: &Session, message: NetconfMessage);

    /// A non-fatal error was reported by the pipeline
    fn on_error(&self, _session: &Session, _error: &NetconfError) {}
}

/// A listener that ignores everything
pub struct NoOpListener;

impl SessionListener for NoOpListener {
    fn on_session_down(&self, _session: &Session, _cause: &NetconfError) {}

    fn on_session_terminated(&self, _session: &Session, _reason: &TerminationReason) {}

    fn on_message(&self, _session: &Session, _message: NetconfMessage) {}
}
