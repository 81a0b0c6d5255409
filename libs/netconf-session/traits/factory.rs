use crate::core::channel::Channel;
use crate::core::session::Session;
use crate::framing::FramingMechanism;
use crate::message::HelloMessage;
use crate::traits::{Result, SessionListener};
use std::sync::Arc;

/// Trait for building the session object once negotiation succeeds
///
/// Called on the channel's context right after the framing mechanism has
/// been installed. Returning an error fails the negotiation; the error is
/// what the attempt's completion handle resolves with.
pub trait SessionFactory: Send + Sync + 'static {
    fn create_session(
        &self,
        listener: Arc<dyn SessionListener>,
        channel: &Channel,
        peer_hello: &HelloMessage,
        framing: FramingMechanism,
    ) -> Result<Session>;
}
